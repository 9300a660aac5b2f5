//! Sign in, sign out and identity.

use std::io::BufRead;

use super::{CliError, Context, Result};
use crate::output;

/// Sign in with email and password.
///
/// When no password is given it is read from the first line of stdin, so it
/// can be piped in instead of landing in the shell history.
pub async fn login(ctx: &Context, email: &str, password: Option<String>) -> Result<()> {
    let password = match password {
        Some(password) => password,
        None => read_password()?,
    };
    if password.is_empty() {
        return Err(CliError::Invalid("Password is required".to_string()));
    }

    let identity = ctx.api.login(&ctx.session, email.trim(), &password).await?;
    ctx.persist().await?;

    tracing::info!(user_id = ?identity.user_id, "Signed in");
    output::line(format!("Signed in as {}", identity.display_name()))?;
    Ok(())
}

fn read_password() -> Result<String> {
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Forget the stored tokens.
pub async fn logout(ctx: &Context) -> Result<()> {
    ctx.api.sign_out(&ctx.session).await;
    ctx.persist().await?;
    output::line("Signed out")?;
    Ok(())
}

/// Show who the stored tokens belong to.
pub async fn whoami(ctx: &Context) -> Result<()> {
    let identity = ctx.identity().await;
    ctx.persist().await?;

    if !identity.is_authenticated {
        output::line("Not signed in")?;
        return Ok(());
    }

    let role = if identity.is_admin {
        "admin"
    } else if identity.is_agency {
        "agency"
    } else {
        "customer"
    };
    output::line(format!("{} ({role})", identity.display_name()))?;
    if let Some(email) = &identity.email {
        output::line(format!("email:    {email}"))?;
    }
    if let Some(id) = identity.user_id {
        output::line(format!("user id:  {id}"))?;
    }
    if let Some(expires_at) = identity.expires_at {
        output::line(format!("expires:  {}", expires_at.format("%Y-%m-%d %H:%M UTC")))?;
    }
    Ok(())
}
