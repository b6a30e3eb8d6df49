//! Password acquisition via masked TTY prompt or the VELLUM_PASSWORD
//! environment variable.

use anyhow::{bail, Context, Result};
use std::io::IsTerminal;
use zeroize::Zeroizing;

/// Environment variable consulted before prompting, for scripted use.
pub const PASSWORD_ENV_VAR: &str = "VELLUM_PASSWORD";

/// Reads the journal password, preferring the environment variable and
/// falling back to a masked interactive prompt.
pub fn password() -> Result<Zeroizing<String>> {
    if let Some(password) = password_from_env() {
        return Ok(password);
    }

    if !std::io::stdin().is_terminal() {
        bail!("no password given — set {PASSWORD_ENV_VAR} or run interactively");
    }

    eprint!("Password: ");
    let password =
        Zeroizing::new(rpassword::read_password().context("failed to read password")?);
    if password.is_empty() {
        bail!("empty password not allowed");
    }
    Ok(password)
}

/// Reads a new journal password, prompting twice and requiring both entries
/// to match. The environment variable skips the confirmation.
pub fn new_password() -> Result<Zeroizing<String>> {
    if let Some(password) = password_from_env() {
        return Ok(password);
    }

    if !std::io::stdin().is_terminal() {
        bail!("no password given — set {PASSWORD_ENV_VAR} or run interactively");
    }

    eprintln!("Create a password for your journal. If you forget it, your entries are gone.");
    eprint!("New password: ");
    let first = Zeroizing::new(rpassword::read_password().context("failed to read password")?);
    eprint!("Re-enter password: ");
    let second = Zeroizing::new(rpassword::read_password().context("failed to read password")?);

    if *first != *second {
        bail!("passwords don't match");
    }
    if first.is_empty() {
        bail!("empty password not allowed");
    }
    Ok(first)
}

fn password_from_env() -> Option<Zeroizing<String>> {
    match std::env::var(PASSWORD_ENV_VAR) {
        Ok(password) if !password.is_empty() => Some(Zeroizing::new(password)),
        _ => None,
    }
}
