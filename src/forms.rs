//! Login, signup and password recovery forms.
//!
//! Failures come back as [`DashboardError`]; callers show
//! [`DashboardError::inline_message`] under the form and stay on the page.

use serde::Serialize;
use tracing::{info, warn};

use crate::{
    api::ApiClient,
    errors::DashboardError,
    models::RegisterRequest,
    navigation::{Navigator, Page},
    session::Session,
};

pub const MIN_PASSWORD_LEN: usize = 6;

fn check_new_password(password: &str, confirmation: &str) -> Result<(), DashboardError> {
    if password != confirmation {
        return Err(DashboardError::Validation(
            "Passwords do not match".to_string(),
        ));
    }
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(DashboardError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

impl LoginForm {
    pub fn new(email: &str, password: &str) -> Self {
        Self {
            email: email.to_string(),
            password: password.to_string(),
        }
    }

    /// Sign in and move to the dashboard for the user's role.
    ///
    /// On failure the navigator is left untouched.
    pub async fn submit(
        &self,
        session: &mut Session,
        navigator: &mut Navigator,
    ) -> Result<Page, DashboardError> {
        match session.login(self.email.trim(), &self.password).await {
            Ok(user) => {
                let role = user.role.clone();
                Ok(navigator.after_login(&role))
            }
            Err(e) => {
                warn!("Login failed for {}: {}", self.email, e);
                Err(e)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub device_id: String,
    pub password: String,
    pub confirm_password: String,
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl SignupForm {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }

    /// Checks that need no request
    pub fn validate(&self) -> Result<(), DashboardError> {
        check_new_password(&self.password, &self.confirm_password)
    }

    pub fn to_request(&self) -> RegisterRequest {
        RegisterRequest {
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            name: non_empty(&self.full_name()),
            device_id: non_empty(&self.device_id),
            phone: non_empty(&self.phone),
            user_type: None,
        }
    }

    pub async fn submit(
        &self,
        session: &mut Session,
        navigator: &mut Navigator,
    ) -> Result<Page, DashboardError> {
        self.validate()?;
        let role = session.register(&self.to_request()).await?.role.clone();
        session.refresh().await?;
        Ok(navigator.after_signup(&role))
    }
}

/// Steps of the forgot-password wizard
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStep {
    Login,
    Request,
    Verify,
    Success,
}

/// Forgot-password wizard.
///
/// `Login -> Request -> Verify -> Success`, with `Verify -> Request` to
/// change the email and `Success -> Login` to start over. Each transition
/// is only valid from its own step.
#[derive(Debug, Clone)]
pub struct PasswordRecovery {
    step: RecoveryStep,
    email: String,
    issued_code: Option<String>,
}

impl Default for PasswordRecovery {
    fn default() -> Self {
        Self::new()
    }
}

impl PasswordRecovery {
    pub fn new() -> Self {
        Self {
            step: RecoveryStep::Login,
            email: String::new(),
            issued_code: None,
        }
    }

    pub fn step(&self) -> RecoveryStep {
        self.step
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Code the API returned for the current request
    pub fn issued_code(&self) -> Option<&str> {
        self.issued_code.as_deref()
    }

    fn expect_step(&self, expected: RecoveryStep) -> Result<(), DashboardError> {
        if self.step != expected {
            return Err(DashboardError::Validation(format!(
                "Not available while at {:?}",
                self.step
            )));
        }
        Ok(())
    }

    /// "Forgot password?" from the login form
    pub fn begin(&mut self) -> Result<(), DashboardError> {
        self.expect_step(RecoveryStep::Login)?;
        self.step = RecoveryStep::Request;
        Ok(())
    }

    pub async fn request_code(
        &mut self,
        client: &ApiClient,
        email: &str,
    ) -> Result<(), DashboardError> {
        self.expect_step(RecoveryStep::Request)?;
        let email = email.trim();
        if email.is_empty() {
            return Err(DashboardError::Validation(
                "Email is required".to_string(),
            ));
        }
        let response = client.forgot_password(email).await?;
        info!("Password reset code issued for {}", email);
        self.email = email.to_string();
        self.issued_code = Some(response.code);
        self.step = RecoveryStep::Verify;
        Ok(())
    }

    /// Back from verification to enter another email
    pub fn back(&mut self) -> Result<(), DashboardError> {
        self.expect_step(RecoveryStep::Verify)?;
        self.issued_code = None;
        self.step = RecoveryStep::Request;
        Ok(())
    }

    pub async fn verify(
        &mut self,
        client: &ApiClient,
        code: &str,
        new_password: &str,
        confirmation: &str,
    ) -> Result<(), DashboardError> {
        self.expect_step(RecoveryStep::Verify)?;
        let code = code.trim();
        if code.is_empty() {
            return Err(DashboardError::Validation(
                "Verification code is required".to_string(),
            ));
        }
        check_new_password(new_password, confirmation)?;
        client
            .reset_password(&self.email, code, new_password)
            .await?;
        self.step = RecoveryStep::Success;
        Ok(())
    }

    /// Back to the login form once the password is reset
    pub fn finish(&mut self) -> Result<(), DashboardError> {
        self.expect_step(RecoveryStep::Success)?;
        *self = Self::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signup_rejects_mismatch_before_length() {
        let form = SignupForm {
            password: "abc".to_string(),
            confirm_password: "abd".to_string(),
            ..SignupForm::default()
        };
        assert_eq!(
            form.validate().unwrap_err().inline_message(),
            "Passwords do not match"
        );
    }

    #[test]
    fn signup_rejects_short_password() {
        let form = SignupForm {
            password: "abc12".to_string(),
            confirm_password: "abc12".to_string(),
            ..SignupForm::default()
        };
        assert_eq!(
            form.validate().unwrap_err().inline_message(),
            "Password must be at least 6 characters"
        );
    }

    #[test]
    fn signup_request_drops_blank_fields() {
        let form = SignupForm {
            first_name: " Mana ".to_string(),
            last_name: "".to_string(),
            email: "mana@example.com ".to_string(),
            device_id: "device_05".to_string(),
            password: "secret1".to_string(),
            confirm_password: "secret1".to_string(),
            ..SignupForm::default()
        };

        let request = form.to_request();
        assert_eq!(request.email, "mana@example.com");
        assert_eq!(request.name.as_deref(), Some("Mana"));
        assert_eq!(request.device_id.as_deref(), Some("device_05"));
        assert_eq!(request.phone, None);
    }

    #[test]
    fn recovery_transitions_are_step_bound() {
        let mut recovery = PasswordRecovery::new();
        assert!(recovery.back().is_err());
        assert!(recovery.finish().is_err());

        recovery.begin().unwrap();
        assert_eq!(recovery.step(), RecoveryStep::Request);
        assert!(recovery.begin().is_err());
        assert!(recovery.back().is_err());
    }
}
