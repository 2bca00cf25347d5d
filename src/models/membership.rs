use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::authz::{MembershipRecord, ProjectRole};
use crate::events::{Loggable, Severity};

/// A user's role on one project.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProjectMember {
    pub user_id: Uuid,
    pub project_id: Uuid,
    /// Stored role name; may be outside the catalog if the row predates it.
    #[schema(example = "project_member")]
    pub project_role: String,
}

impl From<MembershipRecord> for ProjectMember {
    fn from(record: MembershipRecord) -> Self {
        Self {
            user_id: record.user_id,
            project_id: record.project_id,
            project_role: record.project_role,
        }
    }
}

impl Loggable for ProjectMember {
    fn entity_type() -> &'static str { "project_member" }
    fn subject_id(&self) -> Uuid { self.project_id }
    fn severity(&self) -> Severity { Severity::Critical }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
    #[schema(example = "project_member")]
    pub project_role: String,
}

impl AddMemberRequest {
    pub fn role(&self) -> Result<ProjectRole, crate::authz::UnknownName> {
        self.project_role.parse()
    }
}
