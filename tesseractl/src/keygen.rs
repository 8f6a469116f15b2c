use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use rand::Rng;
use tessera_core::domain::tokens::keys::{
    ed25519_private_pem, ed25519_public_pem,
};
use zeroize::Zeroizing;

pub const PRIVATE_KEY_FILE: &str = "signing.pem";
pub const PUBLIC_KEY_FILE: &str = "signing.pub.pem";
pub const BINDING_KEY_FILE: &str = "binding.key";

#[derive(Debug)]
pub struct GeneratedKeys {
    pub private_key: PathBuf,
    pub public_key: PathBuf,
    pub binding_key: PathBuf,
}

/// Write a fresh Ed25519 signing pair and a random binding key to `out_dir`.
pub fn generate(out_dir: &Path, force: bool) -> Result<GeneratedKeys> {
    let generated = GeneratedKeys {
        private_key: out_dir.join(PRIVATE_KEY_FILE),
        public_key: out_dir.join(PUBLIC_KEY_FILE),
        binding_key: out_dir.join(BINDING_KEY_FILE),
    };

    if !force {
        for path in [
            &generated.private_key,
            &generated.public_key,
            &generated.binding_key,
        ] {
            if path.exists() {
                bail!(
                    "{} already exists; pass --force to overwrite",
                    path.display()
                );
            }
        }
    }

    fs::create_dir_all(out_dir).with_context(|| {
        format!("failed to create {}", out_dir.display())
    })?;

    let mut rng = rand::rng();
    let mut seed = Zeroizing::new([0u8; 32]);
    rng.fill(&mut *seed);
    let mut binding = Zeroizing::new([0u8; 32]);
    rng.fill(&mut *binding);

    let private_pem =
        ed25519_private_pem(&seed).context("failed to encode signing key")?;
    let public_pem =
        ed25519_public_pem(&seed).context("failed to encode public key")?;
    let binding_hex = Zeroizing::new(format!("{}\n", hex::encode(&*binding)));

    write_secret(&generated.private_key, private_pem.as_bytes())?;
    fs::write(&generated.public_key, public_pem).with_context(|| {
        format!("failed to write {}", generated.public_key.display())
    })?;
    write_secret(&generated.binding_key, binding_hex.as_bytes())?;

    Ok(generated)
}

fn write_secret(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let mut file = options
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    // `mode` only applies on create; an overwritten file keeps its old bits.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        file.set_permissions(fs::Permissions::from_mode(0o600))
            .with_context(|| {
                format!("failed to restrict permissions on {}", path.display())
            })?;
    }
    file.write_all(contents)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}
