/*!
 * # Role-Based Access Control
 *
 * Each account holds exactly one role. Roles grant a fixed set of
 * capabilities; handlers and services ask for a capability, never a role.
 */

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    ToSchema,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Role {
    #[sea_orm(string_value = "sales")]
    Sales,
    #[sea_orm(string_value = "warehouse")]
    Warehouse,
    #[sea_orm(string_value = "manager")]
    Manager,
    #[sea_orm(string_value = "admin")]
    Admin,
}

/// Something a signed-in user may do. Rendered as `resource:action`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display)]
pub enum Capability {
    #[strum(serialize = "returns:submit")]
    SubmitReturn,
    #[strum(serialize = "returns:approve-warehouse")]
    ApproveWarehouse,
    #[strum(serialize = "returns:approve-manager")]
    ApproveManager,
    #[strum(serialize = "returns:reject")]
    RejectReturn,
    #[strum(serialize = "returns:read-all")]
    ViewAllReturns,
    #[strum(serialize = "approvals:read")]
    ViewApprovals,
    #[strum(serialize = "returns:export")]
    ExportDataset,
    #[strum(serialize = "analytics:read")]
    ViewAnalytics,
    #[strum(serialize = "users:manage")]
    ManageUsers,
}

impl Role {
    pub fn capabilities(self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Role::Sales => &[SubmitReturn],
            Role::Warehouse => &[
                ApproveWarehouse,
                RejectReturn,
                ViewAllReturns,
                ViewApprovals,
                ViewAnalytics,
            ],
            Role::Manager => &[
                ApproveManager,
                RejectReturn,
                ViewAllReturns,
                ViewApprovals,
                ExportDataset,
                ViewAnalytics,
            ],
            Role::Admin => &[
                RejectReturn,
                ViewAllReturns,
                ViewApprovals,
                ExportDataset,
                ViewAnalytics,
                ManageUsers,
            ],
        }
    }

    pub fn permits(self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_sales_submit() {
        assert!(Role::Sales.permits(Capability::SubmitReturn));
        assert!(!Role::Warehouse.permits(Capability::SubmitReturn));
        assert!(!Role::Manager.permits(Capability::SubmitReturn));
        assert!(!Role::Admin.permits(Capability::SubmitReturn));
    }

    #[test]
    fn approval_steps_belong_to_one_role_each() {
        assert!(Role::Warehouse.permits(Capability::ApproveWarehouse));
        assert!(!Role::Warehouse.permits(Capability::ApproveManager));
        assert!(Role::Manager.permits(Capability::ApproveManager));
        assert!(!Role::Manager.permits(Capability::ApproveWarehouse));
        assert!(!Role::Admin.permits(Capability::ApproveWarehouse));
        assert!(!Role::Admin.permits(Capability::ApproveManager));
    }

    #[test]
    fn sales_cannot_see_other_returns() {
        assert!(!Role::Sales.permits(Capability::ViewAllReturns));
        assert!(!Role::Sales.permits(Capability::ViewApprovals));
        assert!(!Role::Sales.permits(Capability::ExportDataset));
    }

    #[test]
    fn roles_parse_case_insensitively() {
        assert_eq!("Warehouse".parse::<Role>().unwrap(), Role::Warehouse);
        assert_eq!(Role::Manager.to_string(), "manager");
        assert!("clerk".parse::<Role>().is_err());
    }

    #[test]
    fn capability_labels() {
        assert_eq!(Capability::ApproveWarehouse.to_string(), "returns:approve-warehouse");
    }
}
