//! Relationship metadata.
//!
//! Relationships are derived from foreign-key fields on a schema. A foreign key
//! on `OrganizationUser.UserID` pointing at `User` is a many-to-one relation
//! from the child's side; its `related_name` names the reverse one-to-many
//! relation seen from `User`.

use crate::field::FieldInfo;

/// The direction of a relationship between two models.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RelationshipKind {
    /// Many rows of this model point at one row of the related model.
    #[default]
    ManyToOne,
    /// One row of this model is pointed at by many rows of the related model.
    OneToMany,
}

/// Metadata about a relationship between models.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationshipInfo {
    /// Relation name: the foreign-key field for many-to-one, the
    /// `related_name` for one-to-many.
    pub name: &'static str,

    /// Model name on the other side.
    pub related_model: &'static str,

    /// Kind of relationship.
    pub kind: RelationshipKind,

    /// Column holding the foreign key.
    /// e.g., `"UserID"` on `OrganizationUser`, for both directions.
    pub key_column: &'static str,

    /// Name of the relation seen from the other side, if declared.
    pub back_populates: Option<&'static str>,

    /// Cascade delete behavior.
    pub cascade_delete: bool,
}

impl RelationshipInfo {
    /// Many-to-one relationship described by a foreign-key field.
    ///
    /// Returns `None` for plain fields.
    #[must_use]
    pub fn from_field(field: &FieldInfo) -> Option<Self> {
        let fk = field.foreign_key.as_ref()?;
        Some(Self {
            name: field.name,
            related_model: fk.related_model,
            kind: RelationshipKind::ManyToOne,
            key_column: field.name,
            back_populates: fk.related_name,
            cascade_delete: fk.cascade_delete,
        })
    }

    /// The reverse view of a many-to-one relationship declared on `owner_model`.
    ///
    /// Returns `None` when the foreign key declares no `related_name`.
    #[must_use]
    pub fn reverse(&self, owner_model: &'static str) -> Option<Self> {
        if self.kind != RelationshipKind::ManyToOne {
            return None;
        }
        Some(Self {
            name: self.back_populates?,
            related_model: owner_model,
            kind: RelationshipKind::OneToMany,
            key_column: self.key_column,
            back_populates: Some(self.name),
            cascade_delete: self.cascade_delete,
        })
    }
}

/// Find a relationship by name.
#[must_use]
pub fn find_relationship<'a>(
    relationships: &'a [RelationshipInfo],
    name: &str,
) -> Option<&'a RelationshipInfo> {
    relationships.iter().find(|r| r.name == name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relationship_kind_default() {
        assert_eq!(RelationshipKind::default(), RelationshipKind::ManyToOne);
    }

    #[test]
    fn test_from_foreign_key_field() {
        let field = FieldInfo::foreign_key("OrganizationID", "Organization")
            .related_name("users")
            .cascade_delete();
        let info = RelationshipInfo::from_field(&field).unwrap();

        assert_eq!(info.name, "OrganizationID");
        assert_eq!(info.related_model, "Organization");
        assert_eq!(info.kind, RelationshipKind::ManyToOne);
        assert_eq!(info.key_column, "OrganizationID");
        assert_eq!(info.back_populates, Some("users"));
        assert!(info.cascade_delete);

        assert!(RelationshipInfo::from_field(&FieldInfo::string("Name")).is_none());
    }

    #[test]
    fn test_reverse_needs_related_name() {
        let named = FieldInfo::foreign_key("OrganizationID", "Organization").related_name("users");
        let info = RelationshipInfo::from_field(&named).unwrap();
        let reverse = info.reverse("OrganizationUser").unwrap();
        assert_eq!(reverse.name, "users");
        assert_eq!(reverse.related_model, "OrganizationUser");
        assert_eq!(reverse.kind, RelationshipKind::OneToMany);
        assert_eq!(reverse.back_populates, Some("OrganizationID"));
        assert!(reverse.reverse("Organization").is_none());

        let unnamed = FieldInfo::foreign_key("UserID", "User");
        let info = RelationshipInfo::from_field(&unnamed).unwrap();
        assert!(info.reverse("OrganizationUser").is_none());
    }

    #[test]
    fn test_find_relationship() {
        let rels = vec![
            RelationshipInfo::from_field(&FieldInfo::foreign_key("A", "ModelA")).unwrap(),
            RelationshipInfo::from_field(&FieldInfo::foreign_key("B", "ModelB")).unwrap(),
        ];
        assert_eq!(find_relationship(&rels, "B").map(|r| r.related_model), Some("ModelB"));
        assert!(find_relationship(&rels, "C").is_none());
    }
}
