/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id hashing and the sign-up password rule
/// - [`jwt`]: access/refresh tokens carrying user id and email
/// - [`middleware`]: Axum middleware producing an [`middleware::AuthContext`]
/// - [`authorization`]: the membership-aware access gate
///
/// # Example
///
/// ```
/// use teamboard_shared::auth::password::{hash_password, verify_password};
/// use teamboard_shared::auth::jwt::{create_token, validate_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("user_password")?;
/// assert!(verify_password("user_password", &hash)?);
///
/// let claims = Claims::new(Uuid::new_v4(), "user@example.com", TokenType::Access);
/// let token = create_token(&claims, "a-secret-of-at-least-thirty-two-bytes!")?;
/// assert!(validate_token(&token, "a-secret-of-at-least-thirty-two-bytes!").is_ok());
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
