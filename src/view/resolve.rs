//! Namespaced path resolution for [`View::get`](crate::view::View::get).

/// The bag a dotted path is resolved against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace<'a> {
    /// `data.<rest>`: the data bag.
    Data(&'a str),
    /// `state.<rest>`: the UI-only state bag.
    State(&'a str),
    /// `model.<rest>`: the bound model's attributes.
    Model(&'a str),
    /// Anything else: the view's own properties.
    SelfProp(&'a str),
}

impl<'a> Namespace<'a> {
    /// Classify `path` by its first segment. A bare namespace name (`"data"`)
    /// addresses the whole bag and yields an empty rest.
    pub fn split(path: &'a str) -> Self {
        let (head, rest) = match path.split_once('.') {
            Some((head, rest)) => (head, rest),
            None => (path, ""),
        };
        match head {
            "data" => Namespace::Data(rest),
            "state" => Namespace::State(rest),
            "model" => Namespace::Model(rest),
            _ => Namespace::SelfProp(path),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_first_segment_only() {
        assert_eq!(Namespace::split("data.user.name"), Namespace::Data("user.name"));
        assert_eq!(Namespace::split("state"), Namespace::State(""));
        assert_eq!(Namespace::split("model.id"), Namespace::Model("id"));
        assert_eq!(Namespace::split("title"), Namespace::SelfProp("title"));
        assert_eq!(Namespace::split("database.x"), Namespace::SelfProp("database.x"));
    }
}
