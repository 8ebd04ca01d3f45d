//! Role -> writable field table.
//!
//! # Invariants
//! - `admin` may write every editable field.
//! - Fields absent from the table are admin-only.
//! - The table is the only authority consulted by the transition engine.

use crate::model::correspondence::Field;
use crate::model::user::Role;

/// Returns whether `role` may write `field`.
pub fn can_write(role: Role, field: Field) -> bool {
    if role == Role::Admin {
        return true;
    }

    match field {
        Field::Status => matches!(role, Role::Level1Ao | Role::Secretary),
        Field::AoComments | Field::DateActionFinalized => role == Role::Level2Ao,
        Field::ActionOfficer => role == Role::Secretary,
        Field::Subject
        | Field::Recipient
        | Field::Content
        | Field::AttachmentRef
        | Field::DeadlineDate
        | Field::DateToAo => false,
    }
}

/// Editable fields `role` may write, in `Field` order.
pub fn writable_fields(role: Role) -> Vec<Field> {
    Field::ALL
        .into_iter()
        .filter(|field| can_write(role, *field))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{can_write, writable_fields};
    use crate::model::correspondence::Field;
    use crate::model::user::Role;

    fn expected(role: Role, field: Field) -> bool {
        let allowed: &[Role] = match field {
            Field::Status => &[Role::Level1Ao, Role::Secretary, Role::Admin],
            Field::AoComments => &[Role::Level2Ao, Role::Admin],
            Field::DateActionFinalized => &[Role::Level2Ao, Role::Admin],
            Field::ActionOfficer => &[Role::Secretary, Role::Admin],
            _ => &[Role::Admin],
        };
        allowed.contains(&role)
    }

    #[test]
    fn matches_table_for_every_role_and_field() {
        for role in Role::ALL {
            for field in Field::ALL {
                assert_eq!(
                    can_write(role, field),
                    expected(role, field),
                    "role={role} field={field}"
                );
            }
        }
    }

    #[test]
    fn admin_writes_everything() {
        assert_eq!(writable_fields(Role::Admin), Field::ALL.to_vec());
    }

    #[test]
    fn level3_officer_writes_nothing() {
        assert!(writable_fields(Role::Level3Ao).is_empty());
    }

    #[test]
    fn writable_fields_per_role() {
        assert_eq!(writable_fields(Role::Level1Ao), vec![Field::Status]);
        assert_eq!(
            writable_fields(Role::Level2Ao),
            vec![Field::AoComments, Field::DateActionFinalized]
        );
        assert_eq!(
            writable_fields(Role::Secretary),
            vec![Field::Status, Field::ActionOfficer]
        );
    }
}
