//! Signs the channel-reading account in and writes the MTProto session file
//! that `chanfwd` loads. Run once interactively; rerun if the session is revoked.

use std::io::{self, BufRead, Write};

use anyhow::{bail, Context, Result};
use grammers_client::SignInError;

use chanfwd_core::config::Config;
use chanfwd_mtproto::open_client;

fn prompt(label: &str) -> Result<String> {
    print!("{label}: ");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = Config::load().context("failed to load configuration")?;
    let session_file = cfg.session_file.as_path();

    let client = open_client(&cfg.credentials, session_file)
        .await
        .context("failed to connect to Telegram")?;

    if client.is_authorized().await? {
        println!("{} is already signed in.", session_file.display());
        return Ok(());
    }

    let phone = prompt("Phone number (international format)")?;
    if phone.is_empty() {
        bail!("a phone number is required");
    }
    let token = client
        .request_login_code(&phone)
        .await
        .context("failed to request login code")?;
    let code = prompt("Login code")?;

    match client.sign_in(&token, &code).await {
        Ok(_) => {}
        Err(SignInError::PasswordRequired(password_token)) => {
            let hint = password_token.hint().unwrap_or("none").to_string();
            let password = prompt(&format!("Two-step password (hint: {hint})"))?;
            client
                .check_password(password_token, password.trim())
                .await
                .context("password check failed")?;
        }
        Err(e) => return Err(e).context("sign in failed"),
    }

    client
        .session()
        .save_to_file(session_file)
        .with_context(|| format!("failed to write {}", session_file.display()))?;
    println!("Signed in. Session saved to {}.", session_file.display());
    Ok(())
}
