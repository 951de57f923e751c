use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};

use crate::db::entities::user;

/// Looks up the role record for an identity-provider uid. `None` means the
/// token holder is unknown to this system (an authorization failure, not
/// an authentication one).
pub async fn get_user_by_uid(
    db: &DatabaseConnection,
    uid: &str,
) -> Result<Option<user::Model>, DbErr> {
    user::Entity::find_by_id(uid).one(db).await
}

pub async fn list_users(db: &DatabaseConnection) -> Result<Vec<user::Model>, DbErr> {
    user::Entity::find()
        .order_by_asc(user::Column::Email)
        .all(db)
        .await
}

pub async fn email_exists(db: &DatabaseConnection, email: &str) -> Result<bool, DbErr> {
    Ok(user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await?
        .is_some())
}

pub async fn create_user(
    db: &DatabaseConnection,
    uid: &str,
    email: &str,
    role: &str,
) -> Result<user::Model, DbErr> {
    let new_user = user::ActiveModel {
        uid: Set(uid.to_string()),
        email: Set(email.to_string()),
        role: Set(role.to_string()),
        created_at: Set(Utc::now()),
    };
    new_user.insert(db).await
}
