use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

use crate::core::error::DetectorError;
use crate::core::geometry::{Point, Quad};
use crate::core::model::TextFragment;
use crate::ocr::Detector;

/// One detection as printed by the bridge script.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrToken {
    pub polygon: Vec<[f32; 2]>,
    pub text: String,
    #[serde(default)]
    pub confidence: f32,
}

impl TryFrom<OcrToken> for TextFragment {
    type Error = DetectorError;

    fn try_from(token: OcrToken) -> Result<Self, Self::Error> {
        let points: [Point; 4] = match token.polygon.as_slice() {
            [a, b, c, d] => [a, b, c, d].map(|p| Point::new(p[0], p[1])),
            other => {
                return Err(DetectorError::MalformedPolygon {
                    text: token.text,
                    points: other.len(),
                })
            }
        };
        Ok(TextFragment::new(Quad::new(points), token.text, token.confidence))
    }
}

/// Runs an external OCR script once per image and reads JSON detections from
/// its stdout. Each call spawns its own process, so the bridge is safe to
/// share across threads.
#[derive(Debug, Clone)]
pub struct OcrBridge {
    python: PathBuf,
    script_path: PathBuf,
    lang: String,
}

impl Default for OcrBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl OcrBridge {
    pub fn new() -> Self {
        Self {
            python: PathBuf::from("python3"),
            script_path: PathBuf::from("ocr/bridge/ocr_bridge.py"),
            lang: "en".to_string(),
        }
    }

    pub fn with_python(mut self, python: PathBuf) -> Self {
        self.python = python;
        self
    }

    pub fn with_script(mut self, script_path: PathBuf) -> Self {
        self.script_path = script_path;
        self
    }

    pub fn with_lang(mut self, lang: String) -> Self {
        self.lang = lang;
        self
    }

    pub fn run(&self, image_path: &Path) -> Result<Vec<OcrToken>, DetectorError> {
        let output = Command::new(&self.python)
            .arg(&self.script_path)
            .arg("--image")
            .arg(image_path)
            .arg("--lang")
            .arg(&self.lang)
            .output()
            .map_err(DetectorError::Spawn)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(DetectorError::Failed {
                status: output.status,
                stderr,
            });
        }

        parse_tokens(&output.stdout)
    }
}

pub fn parse_tokens(stdout: &[u8]) -> Result<Vec<OcrToken>, DetectorError> {
    Ok(serde_json::from_slice(stdout)?)
}

impl Detector for OcrBridge {
    fn detect(&self, image: &Path) -> Result<Vec<TextFragment>, DetectorError> {
        let tokens = self.run(image)?;
        debug!(image = %image.display(), tokens = tokens.len(), "OCR bridge returned");
        tokens.into_iter().map(TextFragment::try_from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_bridge_output() {
        let stdout = br#"[
            {"polygon": [[10, 20], [60, 20], [60, 40], [10, 40]],
             "text": "Total", "confidence": 0.97},
            {"polygon": [[70, 21], [90, 21], [90, 41], [70, 41]], "text": "42"}
        ]"#;
        let fragments: Vec<TextFragment> = parse_tokens(stdout)
            .unwrap()
            .into_iter()
            .map(TextFragment::try_from)
            .collect::<Result<_, _>>()
            .unwrap();

        assert_eq!(fragments.len(), 2);
        assert_eq!(fragments[0].anchor_y(), 30.0);
        assert_eq!(fragments[1].anchor_x(), 70.0);
        assert_eq!(fragments[1].confidence, 0.0);
    }

    #[test]
    fn rejects_short_polygons() {
        let token = OcrToken {
            polygon: vec![[0.0, 0.0], [1.0, 1.0]],
            text: "x".to_string(),
            confidence: 1.0,
        };
        let err = TextFragment::try_from(token).unwrap_err();
        assert!(matches!(err, DetectorError::MalformedPolygon { points: 2, .. }));
    }

    #[test]
    fn invalid_json_is_a_detector_error() {
        assert!(matches!(
            parse_tokens(b"not json"),
            Err(DetectorError::Parse(_))
        ));
    }

    #[test]
    fn missing_interpreter_is_reported() {
        let bridge =
            OcrBridge::new().with_python(PathBuf::from("/nonexistent/python-for-tests"));
        let err = bridge.detect(Path::new("page.png")).unwrap_err();
        assert!(matches!(err, DetectorError::Spawn(_)));
    }

    #[test]
    fn non_zero_exit_carries_stderr() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("failing_bridge.sh");
        std::fs::write(&script, "echo 'model weights missing' >&2\nexit 3\n").unwrap();

        let bridge = OcrBridge::new()
            .with_python(PathBuf::from("sh"))
            .with_script(script);
        let err = bridge.detect(Path::new("page.png")).unwrap_err();

        match err {
            DetectorError::Failed { status, stderr } => {
                assert_eq!(status.code(), Some(3));
                assert_eq!(stderr, "model weights missing");
            }
            other => panic!("expected a failed bridge, got {other:?}"),
        }
    }
}
