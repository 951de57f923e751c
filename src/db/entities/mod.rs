//! SeaORM entities mapping the dashboard's tables.

pub mod tracked_sheet;
pub mod user;

// Prelude module for easy importing of all entities and their related types
pub mod prelude {
    pub use super::user::Entity as User;
    pub use super::user::Model as UserModel;
    pub use super::user::ActiveModel as UserActiveModel;
    pub use super::user::Column as UserColumn;

    pub use super::tracked_sheet::Entity as TrackedSheet;
    pub use super::tracked_sheet::Model as TrackedSheetModel;
    pub use super::tracked_sheet::ActiveModel as TrackedSheetActiveModel;
    pub use super::tracked_sheet::Column as TrackedSheetColumn;
}
