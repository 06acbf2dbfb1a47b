use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";
const TRAINED_DATA: &str = "eng.traineddata";

#[cfg(windows)]
const EXECUTABLE_NAME: &str = "tesseract.exe";
#[cfg(not(windows))]
const EXECUTABLE_NAME: &str = "tesseract";

#[cfg(windows)]
const COMMON_INSTALL_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR",
    r"C:\Program Files (x86)\Tesseract-OCR",
];
#[cfg(not(windows))]
const COMMON_INSTALL_DIRS: &[&str] = &["/usr/bin", "/usr/local/bin", "/opt/homebrew/bin"];

#[cfg(windows)]
const COMMON_TESSDATA_DIRS: &[&str] = &[
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];
#[cfg(not(windows))]
const COMMON_TESSDATA_DIRS: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
];

pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

/// Returns the directory for storing Tesseract files
pub fn get_tesseract_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("exp-tracker")
        .join("tesseract")
}

/// Ensures Tesseract and English trained data are available.
///
/// The executable must already be installed; the trained data is downloaded
/// into the local data directory when no installed copy is found.
pub fn ensure_tesseract() -> Result<TesseractPaths> {
    let executable = find_tesseract_executable()?;
    tracing::info!("Tesseract executable: {}", executable.display());

    let tessdata = match find_tessdata_dir() {
        Ok(dir) => dir,
        Err(_) => {
            tracing::info!("{} not found locally, downloading...", TRAINED_DATA);
            let dir = get_tesseract_dir().join("tessdata");
            fs::create_dir_all(&dir)?;
            download_tessdata(&dir)?;
            dir
        }
    };
    tracing::info!("Tesseract data: {}", tessdata.display());

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Downloads English trained data into `tessdata_dir`.
fn download_tessdata(tessdata_dir: &Path) -> Result<()> {
    let url = format!("{}/{}", TESSDATA_REPO, TRAINED_DATA);
    let path = tessdata_dir.join(TRAINED_DATA);

    let client = reqwest::blocking::Client::builder()
        .timeout(Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "exp-tracker")
        .send()
        .context("Failed to request trained data")?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}: HTTP {}",
            TRAINED_DATA,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    let mut file = fs::File::create(&path)?;
    file.write_all(&bytes)?;

    tracing::info!("Downloaded {} ({} bytes)", TRAINED_DATA, bytes.len());
    Ok(())
}

/// Finds the Tesseract executable, checking our local dir first, then PATH,
/// then common install locations.
pub fn find_tesseract_executable() -> Result<PathBuf> {
    let local_exe = get_tesseract_dir().join(EXECUTABLE_NAME);
    if local_exe.exists() {
        return Ok(local_exe);
    }

    if let Ok(output) = std::process::Command::new("tesseract")
        .arg("--version")
        .output()
    {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    COMMON_INSTALL_DIRS
        .iter()
        .map(|dir| Path::new(dir).join(EXECUTABLE_NAME))
        .find(|p| p.exists())
        .ok_or_else(|| anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds a directory containing `eng.traineddata`.
pub fn find_tessdata_dir() -> Result<PathBuf> {
    let mut candidates = vec![get_tesseract_dir().join("tessdata")];

    // TESSDATA_PREFIX may point at tessdata itself or at its parent
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        candidates.push(PathBuf::from(&prefix));
        candidates.push(PathBuf::from(&prefix).join("tessdata"));
    }

    candidates.extend(COMMON_TESSDATA_DIRS.iter().map(PathBuf::from));

    find_dir_with_trained_data(&candidates).ok_or_else(|| {
        anyhow!(
            "tessdata directory not found. Please ensure {} is available.",
            TRAINED_DATA
        )
    })
}

fn find_dir_with_trained_data(candidates: &[PathBuf]) -> Option<PathBuf> {
    candidates
        .iter()
        .find(|dir| dir.join(TRAINED_DATA).exists())
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_find_dir_with_trained_data_picks_first_match() {
        let empty = tempdir().unwrap();
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        fs::write(first.path().join(TRAINED_DATA), b"x").unwrap();
        fs::write(second.path().join(TRAINED_DATA), b"x").unwrap();

        let candidates = vec![
            empty.path().to_path_buf(),
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ];
        assert_eq!(
            find_dir_with_trained_data(&candidates),
            Some(first.path().to_path_buf())
        );
    }

    #[test]
    fn test_find_dir_with_trained_data_none() {
        let empty = tempdir().unwrap();
        assert_eq!(find_dir_with_trained_data(&[empty.path().to_path_buf()]), None);
    }
}
