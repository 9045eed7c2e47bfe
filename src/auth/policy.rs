/*!
 * # Access Policy
 *
 * Every department-scoping and role decision the services make goes through
 * this module. Admins see and may do everything; everyone else is confined to
 * their own department, where "their department" for a part also covers parts
 * linked to one of the department's assets.
 */

use sea_orm::sea_query::{Condition, Query};
use sea_orm::ColumnTrait;

use super::{AuthUser, Role};
use crate::entities::{part, part_asset_link, stock_transaction};
use crate::errors::ServiceError;

/// Turns a policy decision into `Forbidden` when it is negative.
pub fn ensure(allowed: bool, action: &str) -> Result<(), ServiceError> {
    if allowed {
        Ok(())
    } else {
        Err(ServiceError::Forbidden(format!(
            "You do not have permission to {}",
            action
        )))
    }
}

/// `None` means unrestricted.
pub fn department_scope(caller: &AuthUser) -> Option<&str> {
    if caller.is_admin() {
        None
    } else {
        Some(caller.department.as_str())
    }
}

pub fn can_view_department(caller: &AuthUser, department: &str) -> bool {
    caller.is_admin() || caller.department == department
}

/// A part is visible in its owning department and in every department that
/// has one of its linked assets.
pub fn can_view_part(
    caller: &AuthUser,
    part: &part::Model,
    links: &[part_asset_link::Model],
) -> bool {
    can_view_department(caller, &part.department)
        || links
            .iter()
            .any(|link| link.asset_department == caller.department)
}

pub fn can_create_part_in(caller: &AuthUser, department: &str) -> bool {
    can_view_department(caller, department)
}

pub fn can_update_part(caller: &AuthUser, part: &part::Model) -> bool {
    can_view_department(caller, &part.department)
}

/// Admins anywhere, managers inside their own department.
pub fn can_change_status(caller: &AuthUser, transaction: &stock_transaction::Model) -> bool {
    match caller.role {
        Role::Admin => true,
        Role::Manager => caller.department == transaction.department,
        Role::Technician | Role::NormalUser => false,
    }
}

pub fn can_delete_transaction(caller: &AuthUser, transaction: &stock_transaction::Model) -> bool {
    caller.is_admin()
        || transaction.created_by == caller.id
        || (caller.is_manager() && caller.department == transaction.department)
}

pub fn can_sync_from_assets(caller: &AuthUser) -> bool {
    matches!(caller.role, Role::Admin | Role::Manager)
}

/// Row filter for part queries; always true for admins.
pub fn part_scope_condition(caller: &AuthUser) -> Condition {
    match department_scope(caller) {
        None => Condition::all(),
        Some(department) => Condition::any()
            .add(part::Column::Department.eq(department))
            .add(
                part::Column::Id.in_subquery(
                    Query::select()
                        .column(part_asset_link::Column::PartId)
                        .from(part_asset_link::Entity)
                        .and_where(part_asset_link::Column::AssetDepartment.eq(department))
                        .to_owned(),
                ),
            ),
    }
}

/// Row filter for ledger queries; always true for admins.
pub fn transaction_scope_condition(caller: &AuthUser) -> Condition {
    match department_scope(caller) {
        None => Condition::all(),
        Some(department) => {
            Condition::all().add(stock_transaction::Column::Department.eq(department))
        }
    }
}
