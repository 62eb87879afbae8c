//! Low-level, formatting-preserving edits on `toml_edit` tables.

use crate::error::IrError;
use crate::value::{item_to_json, json_to_value};
use serde_json::Value as Json;
use toml_edit::{Entry, Item, Key, Table, TableLike, Value};

/// A table-like entry (standard `[table]` or `{ inline }`) with edit helpers
/// that keep surrounding formatting intact.
pub(crate) struct Entries<'a> {
    inner: &'a mut dyn TableLike,
    inline: bool,
}

impl<'a> Entries<'a> {
    pub(crate) fn of(item: &'a mut Item) -> Option<Self> {
        let inline = item.is_inline_table();
        item.as_table_like_mut().map(|inner| Self { inner, inline })
    }

    pub(crate) fn table(table: &'a mut Table) -> Self {
        Self {
            inner: table,
            inline: false,
        }
    }

    /// Whether any entry is written as its own `[header]` section.
    pub(crate) fn uses_subtables(&self) -> bool {
        self.inner.iter().any(|(_, item)| item.is_table())
    }

    pub(crate) fn keys(&self) -> Vec<String> {
        self.inner.iter().map(|(k, _)| k.to_string()).collect()
    }

    pub(crate) fn get_item_mut(&mut self, key: &str) -> Option<&mut Item> {
        self.inner.get_mut(key)
    }

    /// Set `key` to `value`, returning the previous value.
    ///
    /// An existing scalar keeps its surrounding whitespace and comments.
    pub(crate) fn set(&mut self, key: &str, value: &Json) -> Result<Option<Json>, IrError> {
        let new = json_to_value(value)?;
        self.set_value(key, new)
    }

    pub(crate) fn set_value(&mut self, key: &str, new: Value) -> Result<Option<Json>, IrError> {
        match self.inner.get_mut(key) {
            Some(Item::Value(old)) => {
                let previous = crate::value::value_to_json(old);
                replace_keeping_decor(old, new);
                Ok(Some(previous))
            }
            Some(item) => {
                let previous = item_to_json(item);
                *item = Item::Value(new);
                Ok(previous)
            }
            None => {
                self.insert_item(key, Item::Value(new));
                Ok(None)
            }
        }
    }

    /// Insert a new entry at the end.
    pub(crate) fn insert_item(&mut self, key: &str, item: Item) {
        self.inner.insert(key, item);
        self.reflow();
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Json> {
        let removed = self.inner.remove(key)?;
        self.reflow();
        item_to_json(&removed)
    }

    /// Rename `old` to `new` in place. See [`rename_key`].
    pub(crate) fn rename(&mut self, old: &str, new: &str) -> bool {
        rename_key(&mut *self.inner, old, new)
    }

    /// Inline tables have no stable slot for whitespace before `}`,
    /// so adding or dropping a key re-spaces that one table.
    fn reflow(&mut self) {
        if self.inline {
            self.inner.fmt();
        }
    }
}

/// Overwrite a value while keeping the original's prefix/suffix decor.
pub(crate) fn replace_keeping_decor(slot: &mut Value, new: Value) {
    let decor = slot.decor().clone();
    *slot = new;
    *slot.decor_mut() = decor;
}

/// Rename `old` to `new` without moving the entry.
///
/// `toml_edit` has no in-place key rename, so the entry and everything after
/// it are lifted out and re-inserted with their original key formatting.
/// Returns `false` when `old` is missing or `new` is already taken.
pub fn rename_key(table: &mut dyn TableLike, old: &str, new: &str) -> bool {
    if !table.contains_key(old) || table.contains_key(new) {
        return false;
    }
    let keys: Vec<String> = table.iter().map(|(k, _)| k.to_string()).collect();
    let Some(start) = keys.iter().position(|k| k == old) else {
        return false;
    };

    let mut lifted: Vec<(Key, Item)> = Vec::with_capacity(keys.len() - start);
    for k in &keys[start..] {
        let Some((key, _)) = table.get_key_value(k) else {
            continue;
        };
        let key = key.clone();
        if let Some(item) = table.remove(k) {
            lifted.push((key, item));
        }
    }

    for (key, item) in lifted {
        let key = if key.get() == old {
            let mut renamed = Key::new(new);
            *renamed.leaf_decor_mut() = key.leaf_decor().clone();
            renamed
        } else {
            key
        };
        if let Entry::Vacant(slot) = table.entry_format(&key) {
            slot.insert(item);
        }
    }
    true
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Replace whole-word occurrences of `old` in a type expression.
///
/// `list[User]` and `models.User` match `User`; `UserId` does not.
/// Returns `None` when nothing matched.
pub fn replace_identifier(text: &str, old: &str, new: &str) -> Option<String> {
    if old.is_empty() {
        return None;
    }
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    let mut hit = false;
    for (idx, _) in text.match_indices(old) {
        if idx < last {
            continue;
        }
        let before = text[..idx].chars().next_back();
        let after = text[idx + old.len()..].chars().next();
        if before.is_some_and(is_ident_char) || after.is_some_and(is_ident_char) {
            continue;
        }
        out.push_str(&text[last..idx]);
        out.push_str(new);
        last = idx + old.len();
        hit = true;
    }
    if !hit {
        return None;
    }
    out.push_str(&text[last..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use toml_edit::DocumentMut;

    #[test]
    fn identifier_replacement_respects_word_boundaries() {
        assert_eq!(
            replace_identifier("list[User] | None", "User", "Account").as_deref(),
            Some("list[Account] | None")
        );
        assert_eq!(
            replace_identifier("models.User", "User", "Account").as_deref(),
            Some("models.Account")
        );
        assert_eq!(replace_identifier("UserId", "User", "Account"), None);
        assert_eq!(replace_identifier("SuperUser", "User", "Account"), None);
        assert_eq!(
            replace_identifier("dict[User, User]", "User", "U").as_deref(),
            Some("dict[U, U]")
        );
    }

    #[test]
    fn rename_keeps_position_and_comments() {
        let mut doc: DocumentMut = "a = 1\n# about b\nb = 2 # trailing\nc = 3\n"
            .parse()
            .unwrap();
        assert!(rename_key(doc.as_table_mut(), "b", "beta"));
        assert_eq!(
            doc.to_string(),
            "a = 1\n# about b\nbeta = 2 # trailing\nc = 3\n"
        );
    }

    #[test]
    fn rename_refuses_collisions() {
        let mut doc: DocumentMut = "a = 1\nb = 2\n".parse().unwrap();
        assert!(!rename_key(doc.as_table_mut(), "a", "b"));
        assert!(!rename_key(doc.as_table_mut(), "zz", "y"));
        assert_eq!(doc.to_string(), "a = 1\nb = 2\n");
    }

    #[test]
    fn replacing_a_value_keeps_trailing_comment() {
        let mut doc: DocumentMut = "x = \"str\" # note\n".parse().unwrap();
        let item = doc.as_table_mut().get_mut("x").unwrap();
        let slot = item.as_value_mut().unwrap();
        replace_keeping_decor(slot, Value::from("int"));
        assert_eq!(doc.to_string(), "x = \"int\" # note\n");
    }
}
