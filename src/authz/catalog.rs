//! Permission catalog.
//!
//! Closed enumerations of every permission, global role and project role,
//! plus the two static role tables. Nothing here is mutable at runtime.
//!
//! Adding a permission means adding a variant, listing it in
//! [`Permission::ALL`], and adding it to every role table that should
//! grant it. There is no default-allow fallback: a permission missing
//! from a table is denied.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

/// Grouping used by the catalog endpoint and the admin UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PermissionCategory {
    Project,
    Task,
    Sprint,
    TimeLog,
    Report,
    TestCase,
    TestExecution,
    Bug,
    User,
    Organization,
    Billing,
}

impl PermissionCategory {
    pub const ALL: [PermissionCategory; 11] = [
        PermissionCategory::Project,
        PermissionCategory::Task,
        PermissionCategory::Sprint,
        PermissionCategory::TimeLog,
        PermissionCategory::Report,
        PermissionCategory::TestCase,
        PermissionCategory::TestExecution,
        PermissionCategory::Bug,
        PermissionCategory::User,
        PermissionCategory::Organization,
        PermissionCategory::Billing,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionCategory::Project => "project",
            PermissionCategory::Task => "task",
            PermissionCategory::Sprint => "sprint",
            PermissionCategory::TimeLog => "time_log",
            PermissionCategory::Report => "report",
            PermissionCategory::TestCase => "test_case",
            PermissionCategory::TestExecution => "test_execution",
            PermissionCategory::Bug => "bug",
            PermissionCategory::User => "user",
            PermissionCategory::Organization => "organization",
            PermissionCategory::Billing => "billing",
        }
    }

    /// Categories that only make sense organization-wide.
    pub fn is_organization_only(&self) -> bool {
        matches!(
            self,
            PermissionCategory::User | PermissionCategory::Organization | PermissionCategory::Billing
        )
    }
}

macro_rules! permissions {
    ($( $variant:ident => ($name:literal, $category:ident, $description:literal) ),+ $(,)?) => {
        /// A fine-grained capability, written on the wire as `<category>:<action>`.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum Permission {
            $( $variant, )+
        }

        impl Permission {
            /// The full permission universe.
            pub const ALL: &'static [Permission] = &[ $( Permission::$variant, )+ ];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Permission::$variant => $name, )+
                }
            }

            pub fn category(&self) -> PermissionCategory {
                match self {
                    $( Permission::$variant => PermissionCategory::$category, )+
                }
            }

            pub fn description(&self) -> &'static str {
                match self {
                    $( Permission::$variant => $description, )+
                }
            }
        }

        impl FromStr for Permission {
            type Err = UnknownName;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $name => Ok(Permission::$variant), )+
                    other => Err(UnknownName::new("permission", other)),
                }
            }
        }
    };
}

permissions! {
    ProjectCreate => ("project:create", Project, "Create new projects"),
    ProjectView => ("project:view", Project, "View project details"),
    ProjectViewAll => ("project:view_all", Project, "View every project in the organization"),
    ProjectUpdate => ("project:update", Project, "Edit project settings"),
    ProjectDelete => ("project:delete", Project, "Delete projects"),
    ProjectArchive => ("project:archive", Project, "Archive and restore projects"),
    ProjectManageMembers => ("project:manage_members", Project, "Add, remove and re-role project members"),

    TaskCreate => ("task:create", Task, "Create tasks"),
    TaskView => ("task:view", Task, "View tasks"),
    TaskUpdate => ("task:update", Task, "Edit tasks and move them across the board"),
    TaskDelete => ("task:delete", Task, "Delete tasks"),
    TaskAssign => ("task:assign", Task, "Assign tasks to members"),
    TaskComment => ("task:comment", Task, "Comment on tasks"),

    SprintCreate => ("sprint:create", Sprint, "Create sprints"),
    SprintView => ("sprint:view", Sprint, "View sprints"),
    SprintUpdate => ("sprint:update", Sprint, "Edit sprints"),
    SprintDelete => ("sprint:delete", Sprint, "Delete sprints"),
    SprintManage => ("sprint:manage", Sprint, "Start and complete sprints"),

    TimeLogCreate => ("time_log:create", TimeLog, "Log time"),
    TimeLogView => ("time_log:view", TimeLog, "View time logs"),
    TimeLogUpdate => ("time_log:update", TimeLog, "Edit time logs"),
    TimeLogDelete => ("time_log:delete", TimeLog, "Delete time logs"),
    TimeLogApprove => ("time_log:approve", TimeLog, "Approve submitted time logs"),

    ReportView => ("report:view", Report, "View reports and dashboards"),
    ReportExport => ("report:export", Report, "Export reports"),

    TestCaseCreate => ("test_case:create", TestCase, "Create test cases"),
    TestCaseView => ("test_case:view", TestCase, "View test cases"),
    TestCaseUpdate => ("test_case:update", TestCase, "Edit test cases"),
    TestCaseDelete => ("test_case:delete", TestCase, "Delete test cases"),

    TestExecutionCreate => ("test_execution:create", TestExecution, "Record test executions"),
    TestExecutionView => ("test_execution:view", TestExecution, "View test executions"),
    TestExecutionUpdate => ("test_execution:update", TestExecution, "Edit test executions"),

    BugCreate => ("bug:create", Bug, "Report bugs"),
    BugView => ("bug:view", Bug, "View bugs"),
    BugUpdate => ("bug:update", Bug, "Triage and edit bugs"),
    BugDelete => ("bug:delete", Bug, "Delete bugs"),

    UserCreate => ("user:create", User, "Invite users"),
    UserView => ("user:view", User, "View users"),
    UserUpdate => ("user:update", User, "Edit user profiles"),
    UserDelete => ("user:delete", User, "Deactivate users"),
    UserManageRoles => ("user:manage_roles", User, "Change organization roles"),

    OrganizationView => ("organization:view", Organization, "View organization settings"),
    OrganizationUpdate => ("organization:update", Organization, "Edit organization settings"),

    BillingView => ("billing:view", Billing, "View billing"),
    BillingManage => ("billing:manage", Billing, "Manage subscription and payment"),
}

impl Permission {
    /// Permissions that may only come from a global role.
    pub fn is_organization_scoped(&self) -> bool {
        self.category().is_organization_only()
            || matches!(self, Permission::ProjectCreate | Permission::ProjectViewAll)
    }

    pub fn by_category(category: PermissionCategory) -> impl Iterator<Item = Permission> {
        Permission::ALL
            .iter()
            .copied()
            .filter(move |permission| permission.category() == category)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Permission {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Permission {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Returned when a string does not name a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value}")]
pub struct UnknownName {
    pub kind: &'static str,
    pub value: String,
}

impl UnknownName {
    fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_string(),
        }
    }
}

// =============================================================================
// GLOBAL ROLES
// =============================================================================

/// Organization-wide role, exactly one per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    SuperAdmin,
    Admin,
    ProjectManager,
    TeamMember,
    Client,
    Viewer,
    QaEngineer,
    Tester,
}

impl Role {
    pub const ALL: [Role; 8] = [
        Role::SuperAdmin,
        Role::Admin,
        Role::ProjectManager,
        Role::TeamMember,
        Role::Client,
        Role::Viewer,
        Role::QaEngineer,
        Role::Tester,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::SuperAdmin => "super_admin",
            Role::Admin => "admin",
            Role::ProjectManager => "project_manager",
            Role::TeamMember => "team_member",
            Role::Client => "client",
            Role::Viewer => "viewer",
            Role::QaEngineer => "qa_engineer",
            Role::Tester => "tester",
        }
    }

    /// Row of the global role table.
    pub fn permissions(&self) -> &'static [Permission] {
        use Permission::*;

        match self {
            Role::SuperAdmin => Permission::ALL,
            Role::Admin => &[
                ProjectCreate, ProjectView, ProjectViewAll, ProjectUpdate, ProjectDelete,
                ProjectArchive, ProjectManageMembers,
                TaskCreate, TaskView, TaskUpdate, TaskDelete, TaskAssign, TaskComment,
                SprintCreate, SprintView, SprintUpdate, SprintDelete, SprintManage,
                TimeLogCreate, TimeLogView, TimeLogUpdate, TimeLogDelete, TimeLogApprove,
                ReportView, ReportExport,
                TestCaseView, TestExecutionView,
                BugCreate, BugView, BugUpdate, BugDelete,
                UserCreate, UserView, UserUpdate, UserDelete, UserManageRoles,
                OrganizationView, OrganizationUpdate,
                BillingView,
            ],
            Role::ProjectManager => &[
                ProjectCreate, ProjectView, ProjectUpdate, ProjectArchive, ProjectManageMembers,
                TaskCreate, TaskView, TaskUpdate, TaskDelete, TaskAssign, TaskComment,
                SprintCreate, SprintView, SprintUpdate, SprintDelete, SprintManage,
                TimeLogCreate, TimeLogView, TimeLogApprove,
                ReportView, ReportExport,
                TestCaseView, TestExecutionView,
                BugCreate, BugView, BugUpdate,
                UserView,
            ],
            Role::TeamMember => &[
                ProjectView,
                TaskCreate, TaskView, TaskUpdate, TaskAssign, TaskComment,
                SprintView,
                TimeLogCreate, TimeLogView, TimeLogUpdate,
                ReportView,
                TestCaseView,
                BugCreate, BugView,
            ],
            Role::Client => &[
                ProjectView,
                TaskView, TaskComment,
                SprintView,
                ReportView,
                BugCreate, BugView,
            ],
            Role::Viewer => &[ProjectView, TaskView, SprintView, ReportView],
            Role::QaEngineer => &[
                ProjectView,
                TaskView, TaskUpdate, TaskComment,
                SprintView,
                TimeLogCreate, TimeLogView,
                ReportView,
                TestCaseCreate, TestCaseView, TestCaseUpdate, TestCaseDelete,
                TestExecutionCreate, TestExecutionView, TestExecutionUpdate,
                BugCreate, BugView, BugUpdate, BugDelete,
            ],
            Role::Tester => &[
                ProjectView,
                TaskView, TaskComment,
                TimeLogCreate, TimeLogView,
                TestCaseView,
                TestExecutionCreate, TestExecutionView, TestExecutionUpdate,
                BugCreate, BugView, BugUpdate,
            ],
        }
    }

    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownName::new("role", s))
    }
}

// =============================================================================
// PROJECT ROLES
// =============================================================================

/// Role held on one project; at most one per (user, project).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProjectRole {
    ProjectManager,
    ProjectMember,
    ProjectViewer,
    ProjectClient,
    ProjectQaLead,
    ProjectTester,
}

impl ProjectRole {
    pub const ALL: [ProjectRole; 6] = [
        ProjectRole::ProjectManager,
        ProjectRole::ProjectMember,
        ProjectRole::ProjectViewer,
        ProjectRole::ProjectClient,
        ProjectRole::ProjectQaLead,
        ProjectRole::ProjectTester,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProjectRole::ProjectManager => "project_manager",
            ProjectRole::ProjectMember => "project_member",
            ProjectRole::ProjectViewer => "project_viewer",
            ProjectRole::ProjectClient => "project_client",
            ProjectRole::ProjectQaLead => "project_qa_lead",
            ProjectRole::ProjectTester => "project_tester",
        }
    }

    /// Row of the project role table. Never contains organization-scoped permissions.
    pub fn permissions(&self) -> &'static [Permission] {
        use Permission::*;

        match self {
            ProjectRole::ProjectManager => &[
                ProjectView, ProjectUpdate, ProjectArchive, ProjectManageMembers,
                TaskCreate, TaskView, TaskUpdate, TaskDelete, TaskAssign, TaskComment,
                SprintCreate, SprintView, SprintUpdate, SprintDelete, SprintManage,
                TimeLogCreate, TimeLogView, TimeLogUpdate, TimeLogApprove,
                ReportView, ReportExport,
                TestCaseView, TestExecutionView,
                BugCreate, BugView, BugUpdate, BugDelete,
            ],
            ProjectRole::ProjectMember => &[
                ProjectView,
                TaskCreate, TaskView, TaskUpdate, TaskAssign, TaskComment,
                SprintView,
                TimeLogCreate, TimeLogView, TimeLogUpdate,
                ReportView,
                BugCreate, BugView,
            ],
            ProjectRole::ProjectViewer => &[ProjectView, TaskView, SprintView, ReportView],
            ProjectRole::ProjectClient => &[
                ProjectView,
                TaskView, TaskComment,
                SprintView,
                ReportView,
                BugCreate, BugView,
            ],
            ProjectRole::ProjectQaLead => &[
                ProjectView,
                TaskView, TaskUpdate, TaskComment,
                SprintView,
                TimeLogCreate, TimeLogView,
                ReportView, ReportExport,
                TestCaseCreate, TestCaseView, TestCaseUpdate, TestCaseDelete,
                TestExecutionCreate, TestExecutionView, TestExecutionUpdate,
                BugCreate, BugView, BugUpdate, BugDelete,
            ],
            ProjectRole::ProjectTester => &[
                ProjectView,
                TaskView, TaskComment,
                TimeLogCreate, TimeLogView,
                TestCaseView,
                TestExecutionCreate, TestExecutionView, TestExecutionUpdate,
                BugCreate, BugView, BugUpdate,
            ],
        }
    }

    pub fn grants(&self, permission: Permission) -> bool {
        self.permissions().contains(&permission)
    }
}

impl fmt::Display for ProjectRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProjectRole {
    type Err = UnknownName;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProjectRole::ALL
            .into_iter()
            .find(|role| role.as_str() == s)
            .ok_or_else(|| UnknownName::new("project role", s))
    }
}
