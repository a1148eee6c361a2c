//! Request keys for every cached read, grouped by family.

use crate::cache::RequestKey;

use super::types::ListParams;

pub struct DreamKeys;

impl DreamKeys {
  pub fn all() -> RequestKey {
    RequestKey::new("dreams")
  }

  pub fn lists() -> RequestKey {
    Self::all().with("list")
  }

  pub fn list(params: &ListParams) -> RequestKey {
    Self::lists().with(params.to_pairs())
  }

  pub fn details() -> RequestKey {
    Self::all().with("detail")
  }

  pub fn detail(id: &str) -> RequestKey {
    Self::details().with(id)
  }

  pub fn searches() -> RequestKey {
    Self::all().with("search")
  }

  pub fn search(term: &str) -> RequestKey {
    Self::searches().with(term)
  }
}

pub struct AuthKeys;

impl AuthKeys {
  pub fn all() -> RequestKey {
    RequestKey::new("auth")
  }

  pub fn user() -> RequestKey {
    Self::all().with("user")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_key_families_nest() {
    let list = DreamKeys::list(&ListParams::default());
    assert!(list.starts_with(&DreamKeys::lists()));
    assert!(list.starts_with(&DreamKeys::all()));
    assert!(!DreamKeys::detail("a").starts_with(&DreamKeys::lists()));
    assert!(!DreamKeys::search("sea").starts_with(&DreamKeys::lists()));
    assert!(!AuthKeys::user().starts_with(&DreamKeys::all()));
  }

  #[test]
  fn test_list_key_depends_on_params() {
    let first = DreamKeys::list(&ListParams::default());
    let second = DreamKeys::list(&ListParams::default().with_page(2));
    assert_ne!(first, second);
    assert_eq!(first, DreamKeys::list(&ListParams::default()));
    assert_eq!(first.to_string(), "dreams/list/{limit=10,page=1}");
  }
}
