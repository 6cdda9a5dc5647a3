//! `facegate setup-models`: downloads, decompresses and installs the landmark model.

use anyhow::{bail, Context, Result};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use facegate_models::{ModelIntegrityError, LANDMARK_MODEL};
use facegate_service::Config;

/// Download `url` to `dest` with progress output.
fn download(url: &str, dest: &Path) -> Result<u64> {
    println!("  downloading {} ({})...", url, LANDMARK_MODEL.size_display);

    let resp = ureq::get(url)
        .call()
        .with_context(|| format!("failed to download {url}"))?;

    let content_length = resp
        .headers()
        .get("Content-Length")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());

    let mut reader = resp.into_body().into_reader();
    let mut file =
        fs::File::create(dest).with_context(|| format!("failed to create {}", dest.display()))?;

    let mut buf = [0u8; 65536];
    let mut total: u64 = 0;
    let mut last_pct: u64 = 0;
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])?;
        total += n as u64;

        if let Some(len) = content_length.filter(|len| *len > 0) {
            let pct = (total * 100) / len;
            if pct / 10 > last_pct / 10 {
                print!("  {pct}%\r");
                io::stdout().flush().ok();
                last_pct = pct;
            }
        }
    }
    file.flush()?;
    Ok(total)
}

/// Decompress a bzip2 archive into `dest`. Returns the decompressed size.
fn decompress_bz2(archive: &Path, dest: &Path) -> Result<u64> {
    let input =
        fs::File::open(archive).with_context(|| format!("failed to open {}", archive.display()))?;
    let mut decoder = bzip2::read::BzDecoder::new(io::BufReader::new(input));
    let mut output =
        fs::File::create(dest).with_context(|| format!("failed to create {}", dest.display()))?;

    let written = io::copy(&mut decoder, &mut output)
        .with_context(|| format!("failed to decompress {}", archive.display()))?;
    output.flush()?;
    Ok(written)
}

/// Turn a downloaded archive into the installed model: decompress to a
/// staging file, verify it, then rename it over `dest`.
fn install_from_archive(archive: &Path, dest: &Path, expected_sha256: Option<&str>) -> Result<()> {
    let staged = dest.with_extension("dat.part");

    print!("  decompressing... ");
    io::stdout().flush().ok();
    let decompressed = decompress_bz2(archive, &staged);
    fs::remove_file(archive).ok();
    if let Err(e) = decompressed {
        fs::remove_file(&staged).ok();
        return Err(e);
    }
    println!("ok");

    if let Err(e) = facegate_models::verify_model_file(&staged, expected_sha256) {
        fs::remove_file(&staged).ok();
        return Err(e).context("downloaded landmark model failed verification");
    }

    fs::rename(&staged, dest).with_context(|| {
        format!("failed to rename {} -> {}", staged.display(), dest.display())
    })?;
    Ok(())
}

/// Run the setup command. `model_dir` overrides the configured directory.
pub fn run(model_dir: Option<String>, force: bool) -> Result<()> {
    let config = Config::from_env();
    let dir = model_dir.map(PathBuf::from).unwrap_or(config.model_dir);
    let expected = config.landmark_model_sha256.as_deref();

    println!("Model directory: {}", dir.display());
    fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create directory {}", dir.display()))?;

    if !force {
        match facegate_models::check_landmark_model(&dir, expected) {
            Ok(path) => {
                println!("  {} already present. Nothing to download.", path.display());
                return Ok(());
            }
            Err(ModelIntegrityError::Missing(_)) => {}
            Err(e) => println!("  {e}; re-downloading"),
        }
    }

    let dest = dir.join(LANDMARK_MODEL.name);
    let archive = dest.with_extension("dat.bz2.part");
    if let Err(e) = download(LANDMARK_MODEL.url, &archive) {
        fs::remove_file(&archive).ok();
        return Err(e);
    }
    install_from_archive(&archive, &dest, expected)?;

    let path = facegate_models::check_landmark_model(&dir, expected)?;
    if expected.is_none() {
        println!("  note: FACEGATE_LANDMARK_MODEL_SHA256 is unset, the model is not pinned");
    }
    println!();
    println!("Setup complete: {} installed.", path.display());
    Ok(())
}
