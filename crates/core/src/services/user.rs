//! User service.

use sea_orm::Set;
use shortloop_common::{AppError, AppResult, IdGenerator};
use shortloop_db::{entities::user, repositories::UserRepository};

const MIN_USERNAME_LEN: usize = 3;
const MAX_USERNAME_LEN: usize = 24;
const MAX_BIO_LEN: usize = 160;

/// Input for registering a new user.
#[derive(Debug, Clone)]
pub struct RegisterUserInput {
    pub username: String,
    pub email: String,
}

/// Input for updating a profile.
#[derive(Debug, Clone, Default)]
pub struct UpdateProfileInput {
    pub bio: Option<String>,
    pub avatar_url: Option<String>,
}

fn validate_username(username: &str) -> AppResult<()> {
    if username.len() < MIN_USERNAME_LEN || username.len() > MAX_USERNAME_LEN {
        return Err(AppError::Validation(format!(
            "Username must be {MIN_USERNAME_LEN} to {MAX_USERNAME_LEN} characters"
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_')
    {
        return Err(AppError::Validation(
            "Username may only contain letters, digits and underscores".to_string(),
        ));
    }
    Ok(())
}

/// User service for business logic.
#[derive(Clone)]
pub struct UserService {
    user_repo: UserRepository,
    id_gen: IdGenerator,
}

impl UserService {
    /// Create a new user service.
    #[must_use]
    pub const fn new(user_repo: UserRepository) -> Self {
        Self {
            user_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Register a new user and issue an API token.
    pub async fn register(&self, input: RegisterUserInput) -> AppResult<user::Model> {
        validate_username(&input.username)?;

        if !input.email.contains('@') {
            return Err(AppError::Validation("Invalid email address".to_string()));
        }

        if self
            .user_repo
            .find_by_username(&input.username)
            .await?
            .is_some()
        {
            return Err(AppError::Conflict("Username already taken".to_string()));
        }

        let now = chrono::Utc::now();
        let model = user::ActiveModel {
            id: Set(self.id_gen.generate()),
            username: Set(input.username.clone()),
            username_lower: Set(input.username.to_lowercase()),
            email: Set(input.email),
            token: Set(Some(self.id_gen.generate_token())),
            bio: Set(None),
            avatar_url: Set(None),
            followers_count: Set(0),
            following_count: Set(0),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        };

        self.user_repo.create(model).await
    }

    /// Get a user by ID.
    pub async fn get_by_id(&self, user_id: &str) -> AppResult<user::Model> {
        self.user_repo.get_by_id(user_id).await
    }

    /// Resolve an API token to a user.
    pub async fn authenticate_by_token(&self, token: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_token(token)
            .await?
            .ok_or(AppError::Unauthorized)
    }

    /// Get a user by username.
    pub async fn get_by_username(&self, username: &str) -> AppResult<user::Model> {
        self.user_repo
            .find_by_username(username)
            .await?
            .ok_or_else(|| AppError::UserNotFound(username.to_string()))
    }

    /// Update profile fields. Unset fields are left alone.
    pub async fn update_profile(
        &self,
        user_id: &str,
        input: UpdateProfileInput,
    ) -> AppResult<user::Model> {
        if let Some(ref bio) = input.bio {
            if bio.len() > MAX_BIO_LEN {
                return Err(AppError::Validation(format!(
                    "Bio must be at most {MAX_BIO_LEN} characters"
                )));
            }
        }

        let existing = self.user_repo.get_by_id(user_id).await?;

        let mut model: user::ActiveModel = existing.into();
        if let Some(bio) = input.bio {
            model.bio = Set(Some(bio));
        }
        if let Some(avatar_url) = input.avatar_url {
            model.avatar_url = Set(Some(avatar_url));
        }
        model.updated_at = Set(chrono::Utc::now().into());

        self.user_repo.update(model).await
    }

    /// Search users by username prefix.
    pub async fn search(&self, query: &str, limit: u64) -> AppResult<Vec<user::Model>> {
        if query.trim().is_empty() {
            return Ok(vec![]);
        }
        self.user_repo.search_by_username(query.trim(), limit).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn create_test_user(id: &str, username: &str) -> user::Model {
        user::Model {
            id: id.to_string(),
            username: username.to_string(),
            username_lower: username.to_lowercase(),
            email: format!("{username}@example.com"),
            token: None,
            bio: None,
            avatar_url: None,
            followers_count: 0,
            following_count: 0,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    fn make_service(user_db: MockDatabase) -> UserService {
        UserService::new(UserRepository::new(Arc::new(user_db.into_connection())))
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("alice_99").is_ok());
        assert!(validate_username("ab").is_err());
        assert!(validate_username("has space").is_err());
        assert!(validate_username(&"a".repeat(25)).is_err());
    }

    #[tokio::test]
    async fn test_register_username_taken() {
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[create_test_user("u1", "alice")]]);
        let service = make_service(user_db);

        let result = service
            .register(RegisterUserInput {
                username: "Alice".to_string(),
                email: "alice@example.com".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_register_invalid_email() {
        let service = make_service(MockDatabase::new(DatabaseBackend::Postgres));

        let result = service
            .register(RegisterUserInput {
                username: "alice".to_string(),
                email: "not-an-email".to_string(),
            })
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_get_by_username_missing() {
        let user_db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()]);
        let service = make_service(user_db);

        let result = service.get_by_username("ghost").await;
        assert!(matches!(result, Err(AppError::UserNotFound(_))));
    }
}
