use anyhow::{Result, bail};
use std::io::{self, BufRead, IsTerminal};
use zeroize::Zeroizing;

pub const PASSPHRASE_ENV: &str = "CIPHERLAB_PASSPHRASE";

/// Where the passphrase came from. Piped stdin is consumed by the
/// passphrase line, so the input text must then come from an argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Source {
    Env,
    Stdin,
    Prompt,
}

/// Reads the passphrase for decryption, or `None` when none was supplied.
pub fn read_passphrase() -> Result<Option<(Zeroizing<String>, Source)>> {
    //  CIPHERLAB_PASSPHRASE="correct-horse" cipherlab decrypt --mode password ENVELOPE
    if let Some(pw) = from_env() {
        return Ok(Some((pw, Source::Env)));
    }

    //  printf '%s\n' "$PW" | cipherlab decrypt --mode password ENVELOPE
    if !io::stdin().is_terminal() {
        return Ok(read_stdin_line()?.map(|pw| (pw, Source::Stdin)));
    }

    let pw = Zeroizing::new(rpassword::prompt_password("Passphrase: ")?);
    Ok((!pw.is_empty()).then_some((pw, Source::Prompt)))
}

/// Reads a passphrase for encryption. On a terminal it is typed twice.
pub fn read_new_passphrase() -> Result<Option<(Zeroizing<String>, Source)>> {
    if let Some(pw) = from_env() {
        return Ok(Some((pw, Source::Env)));
    }

    if !io::stdin().is_terminal() {
        return Ok(read_stdin_line()?.map(|pw| (pw, Source::Stdin)));
    }

    let pw1 = Zeroizing::new(rpassword::prompt_password("New passphrase: ")?);
    if pw1.is_empty() {
        return Ok(None);
    }
    let pw2 = Zeroizing::new(rpassword::prompt_password("Confirm passphrase: ")?);

    if pw1 != pw2 {
        bail!("passphrases do not match");
    }

    Ok(Some((pw1, Source::Prompt)))
}

fn from_env() -> Option<Zeroizing<String>> {
    std::env::var(PASSPHRASE_ENV)
        .ok()
        .filter(|pw| !pw.is_empty())
        .map(Zeroizing::new)
}

fn read_stdin_line() -> Result<Option<Zeroizing<String>>> {
    let mut buf = Zeroizing::new(String::new());
    io::stdin().lock().read_line(&mut buf)?;
    trim_newline(&mut buf);

    Ok((!buf.is_empty()).then_some(buf))
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
