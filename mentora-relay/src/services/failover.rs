//! Bounded attempt sequencing across primary and fallback endpoints
//!
//! At most one network call per endpoint of the pair, primary first.

use std::fmt;
use std::future::Future;

/// Which endpoint of a pair an attempt targeted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointRole {
    Primary,
    Fallback,
}

impl EndpointRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            EndpointRole::Primary => "primary",
            EndpointRole::Fallback => "fallback",
        }
    }
}

impl fmt::Display for EndpointRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Primary plus designated fallback URL for one task's webhook
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointPair {
    pub primary: String,
    pub fallback: String,
}

impl EndpointPair {
    pub fn new(primary: impl Into<String>, fallback: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            fallback: fallback.into(),
        }
    }

    /// Attempt order: primary first, then the fallback
    fn attempt_order(&self) -> [(EndpointRole, &str); 2] {
        [
            (EndpointRole::Primary, self.primary.as_str()),
            (EndpointRole::Fallback, self.fallback.as_str()),
        ]
    }
}

/// Terminal failure after every endpoint in the sequence was tried
#[derive(Debug)]
pub struct ExhaustedAttempts<E> {
    pub attempts: u32,
    pub last_role: EndpointRole,
    pub last_error: E,
}

/// Run `attempt` against the primary, then the fallback if it failed
///
/// No backoff between endpoints: a failed attempt moves on immediately.
/// Returns the first success together with the role that produced it; once
/// both endpoints have failed, only the last failure is kept.
pub async fn try_each<'a, T, E, F, Fut>(
    endpoints: &'a EndpointPair,
    mut attempt: F,
) -> Result<(T, EndpointRole), ExhaustedAttempts<E>>
where
    F: FnMut(EndpointRole, &'a str, u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let [(primary_role, primary_url), (fallback_role, fallback_url)] = endpoints.attempt_order();

    match attempt(primary_role, primary_url, 1).await {
        Ok(value) => Ok((value, primary_role)),
        Err(_) => match attempt(fallback_role, fallback_url, 2).await {
            Ok(value) => Ok((value, fallback_role)),
            Err(error) => Err(ExhaustedAttempts {
                attempts: 2,
                last_role: fallback_role,
                last_error: error,
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> EndpointPair {
        EndpointPair::new("http://primary.test", "http://fallback.test")
    }

    #[tokio::test]
    async fn test_primary_success_short_circuits() {
        let endpoints = pair();
        let mut calls = 0;

        let result = try_each(&endpoints, |_role, url, _n| {
            calls += 1;
            let url = url.to_string();
            async move { Ok::<_, String>(url) }
        })
        .await;

        let (value, role) = result.unwrap();
        assert_eq!(value, "http://primary.test");
        assert_eq!(role, EndpointRole::Primary);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_fallback_after_primary_failure() {
        let endpoints = pair();
        let mut calls = 0;

        let result = try_each(&endpoints, |role, _url, _n| {
            calls += 1;
            async move {
                match role {
                    EndpointRole::Primary => Err("primary down".to_string()),
                    EndpointRole::Fallback => Ok(42),
                }
            }
        })
        .await;

        let (value, role) = result.unwrap();
        assert_eq!(value, 42);
        assert_eq!(role, EndpointRole::Fallback);
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_exhausted_reports_last_failure() {
        let endpoints = pair();
        let mut attempt_numbers = Vec::new();

        let result: Result<((), EndpointRole), _> = try_each(&endpoints, |role, _url, n| {
            attempt_numbers.push(n);
            async move { Err(format!("{} refused", role)) }
        })
        .await;

        let exhausted = result.unwrap_err();
        assert_eq!(exhausted.attempts, 2);
        assert_eq!(exhausted.last_role, EndpointRole::Fallback);
        assert_eq!(exhausted.last_error, "fallback refused");
        assert_eq!(attempt_numbers, vec![1, 2]);
    }
}
