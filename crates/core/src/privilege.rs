use std::collections::HashSet;

use crate::types::SubjectId;

/// Capability check deciding which subjects skip token validation.
///
/// Every entry point that gates access consults the same source.
pub trait PrivilegeSource: Send + Sync {
    fn is_privileged(&self, subject: &SubjectId) -> bool;

    /// Whether the subject may run administrative operations.
    fn is_admin(&self, subject: &SubjectId) -> bool {
        self.is_privileged(subject)
    }
}

/// Privileges supplied as static configuration: administrators plus
/// permanently exempt members.
#[derive(Debug, Clone, Default)]
pub struct StaticPrivileges {
    admins: HashSet<SubjectId>,
    exempt: HashSet<SubjectId>,
}

impl StaticPrivileges {
    #[must_use]
    pub fn new(
        admins: impl IntoIterator<Item = SubjectId>,
        exempt: impl IntoIterator<Item = SubjectId>,
    ) -> Self {
        Self {
            admins: admins.into_iter().collect(),
            exempt: exempt.into_iter().collect(),
        }
    }
}

impl PrivilegeSource for StaticPrivileges {
    fn is_privileged(&self, subject: &SubjectId) -> bool {
        self.admins.contains(subject) || self.exempt.contains(subject)
    }

    fn is_admin(&self, subject: &SubjectId) -> bool {
        self.admins.contains(subject)
    }
}
