// ============================================================
// Layer 6 — Prediction Writer
// ============================================================
// Inference output, one row per test sequence:
//
//   id,prediction
//   0,0.8123
//   1,0.4410
//
// Ids follow test-set order starting at 0. Without a fold the
// file is `<run_name>-output.csv`, with fold N it is
// `<run_name>-output_N.csv`.

use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

pub fn output_path(output_dir: impl AsRef<Path>, run_name: &str, fold: Option<usize>) -> PathBuf {
    let file_name = match fold {
        Some(n) => format!("{run_name}-output_{n}.csv"),
        None => format!("{run_name}-output.csv"),
    };
    output_dir.as_ref().join(file_name)
}

/// Write predictions as CSV, creating the parent directory.
pub fn write_predictions(path: &Path, predictions: &[f32]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create output dir '{}'", parent.display()))?;
    }

    let file = fs::File::create(path)
        .with_context(|| format!("Cannot create prediction file '{}'", path.display()))?;
    let mut w = BufWriter::new(file);

    writeln!(w, "id,prediction")?;
    for (id, p) in predictions.iter().enumerate() {
        writeln!(w, "{id},{p}")?;
    }
    w.flush()
        .with_context(|| format!("Cannot write prediction file '{}'", path.display()))?;

    tracing::info!("Wrote {} predictions to '{}'", predictions.len(), path.display());
    Ok(())
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_path_with_and_without_fold() {
        assert_eq!(output_path("out", "run", None), PathBuf::from("out/run-output.csv"));
        assert_eq!(output_path("out", "run", Some(2)), PathBuf::from("out/run-output_2.csv"));
    }

    #[test]
    fn test_rows_match_predictions_and_ids_are_contiguous() {
        let tmp = tempfile::tempdir().unwrap();
        let path = output_path(tmp.path().join("nested"), "dkt", None);

        write_predictions(&path, &[0.25, 0.5, 0.75]).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "id,prediction");
        assert_eq!(lines.len(), 4);
        for (i, line) in lines[1..].iter().enumerate() {
            assert!(line.starts_with(&format!("{i},")));
        }
        assert_eq!(lines[2], "1,0.5");
    }
}
