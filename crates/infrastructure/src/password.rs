//! 账号密码的 bcrypt 实现

use application::{password::PasswordHasherError, PasswordHasher};
use async_trait::async_trait;
use bcrypt::{BcryptError, DEFAULT_COST};
use domain::PasswordHash;

/// bcrypt 计算较慢，统一放进阻塞线程池。
#[derive(Debug, Clone)]
pub struct BcryptPasswordHasher {
    cost: u32,
}

impl BcryptPasswordHasher {
    /// 未配置代价时使用 bcrypt 默认值；代价范围由配置层校验。
    pub fn new(cost: Option<u32>) -> Self {
        Self {
            cost: cost.unwrap_or(DEFAULT_COST),
        }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptPasswordHasher {
    fn default() -> Self {
        Self::new(None)
    }
}

async fn blocking<T: Send + 'static>(
    work: impl FnOnce() -> Result<T, BcryptError> + Send + 'static,
) -> Result<Result<T, BcryptError>, String> {
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|err| err.to_string())
}

#[async_trait]
impl PasswordHasher for BcryptPasswordHasher {
    async fn hash(&self, plaintext: &str) -> Result<PasswordHash, PasswordHasherError> {
        let cost = self.cost;
        let plaintext = plaintext.to_owned();
        let hashed = blocking(move || bcrypt::hash(plaintext, cost))
            .await
            .map_err(PasswordHasherError::hash_error)?
            .map_err(|err| PasswordHasherError::hash_error(err.to_string()))?;

        PasswordHash::new(hashed).map_err(|err| PasswordHasherError::hash_error(err.to_string()))
    }

    /// 库里存的哈希损坏时按密码不匹配处理，登录只会得到凭据错误。
    async fn verify(
        &self,
        plaintext: &str,
        hashed: &PasswordHash,
    ) -> Result<bool, PasswordHasherError> {
        let plaintext = plaintext.to_owned();
        let stored = hashed.as_str().to_owned();
        match blocking(move || bcrypt::verify(plaintext, &stored))
            .await
            .map_err(PasswordHasherError::verify_error)?
        {
            Ok(matches) => Ok(matches),
            Err(
                err @ (BcryptError::InvalidHash(_)
                | BcryptError::InvalidPrefix(_)
                | BcryptError::InvalidCost(_)
                | BcryptError::InvalidBase64(_)),
            ) => {
                tracing::warn!(error = %err, "stored password hash is malformed");
                Ok(false)
            }
            Err(err) => Err(PasswordHasherError::verify_error(err.to_string())),
        }
    }
}
