//! Archiver invocations for extraction and cache packing.
//!
//! Archive formats are never parsed in-process; every operation shells out to
//! the system archiver. Building an invocation is pure so the exact argv can
//! be asserted without spawning anything; only [`ArchiverInvocation::run`]
//! touches the operating system.

use camino::{Utf8Path, Utf8PathBuf};
use tokio::process::Command;
use tracing::debug;

use crate::error::ToolkitError;

/// One fully-described archiver process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ArchiverInvocation {
    pub(crate) program: String,
    pub(crate) args: Vec<String>,
    pub(crate) cwd: Option<Utf8PathBuf>,
}

impl ArchiverInvocation {
    /// `tar` extraction with caller-controlled mode flags.
    pub(crate) fn tar_extract(file: &Utf8Path, destination: &Utf8Path, flags: &[String]) -> Self {
        let mut args: Vec<String> = flags.to_vec();
        args.extend([
            "-C".to_owned(),
            destination.to_string(),
            "-f".to_owned(),
            file.to_string(),
        ]);
        Self {
            program: "tar".to_owned(),
            args,
            cwd: None,
        }
    }

    /// 7-Zip extraction, preferring a caller-supplied `7zr` binary.
    pub(crate) fn seven_zip_extract(
        file: &Utf8Path,
        destination: &Utf8Path,
        seven_zr_path: Option<&Utf8Path>,
    ) -> Self {
        let program = seven_zr_path.map_or_else(|| "7z".to_owned(), Utf8Path::to_string);
        Self {
            program,
            args: vec![
                "x".to_owned(),
                file.to_string(),
                format!("-o{destination}"),
                "-y".to_owned(),
            ],
            cwd: None,
        }
    }

    /// `xar` extraction with optional extra flags appended.
    pub(crate) fn xar_extract(file: &Utf8Path, destination: &Utf8Path, flags: &[String]) -> Self {
        let mut args = vec![
            "-x".to_owned(),
            "-C".to_owned(),
            destination.to_string(),
            "-f".to_owned(),
            file.to_string(),
        ];
        args.extend(flags.iter().cloned());
        Self {
            program: "xar".to_owned(),
            args,
            cwd: None,
        }
    }

    /// `unzip` extraction, run from inside the destination directory.
    pub(crate) fn zip_extract(file: &Utf8Path, destination: &Utf8Path) -> Self {
        Self {
            program: "unzip".to_owned(),
            args: vec!["-o".to_owned(), file.to_string()],
            cwd: Some(destination.to_owned()),
        }
    }

    /// Packs cache paths into a gzipped tar, resolved from a working directory.
    pub(crate) fn cache_pack(archive: &Utf8Path, workdir: &Utf8Path, paths: &[String]) -> Self {
        let mut args = vec![
            "-cz".to_owned(),
            "-f".to_owned(),
            archive.to_string(),
            "-P".to_owned(),
            "-C".to_owned(),
            workdir.to_string(),
        ];
        args.extend(paths.iter().cloned());
        Self {
            program: "tar".to_owned(),
            args,
            cwd: None,
        }
    }

    /// Unpacks a gzipped cache archive into a working directory.
    pub(crate) fn cache_unpack(archive: &Utf8Path, workdir: &Utf8Path) -> Self {
        Self {
            program: "tar".to_owned(),
            args: vec![
                "-xz".to_owned(),
                "-f".to_owned(),
                archive.to_string(),
                "-P".to_owned(),
                "-C".to_owned(),
                workdir.to_string(),
            ],
            cwd: None,
        }
    }

    /// Runs the archiver to completion, surfacing non-zero exits with stderr.
    pub(crate) async fn run(self) -> Result<(), ToolkitError> {
        debug!(program = %self.program, args = ?self.args, "running archiver");
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        if let Some(cwd) = &self.cwd {
            command.current_dir(cwd);
        }
        let output = command.output().await.map_err(|error| {
            ToolkitError::io(format!("failed to run `{}`", self.program), error)
        })?;
        if output.status.success() {
            return Ok(());
        }
        let detail = output.status.code().map_or_else(
            || "a signal".to_owned(),
            |code| format!("exit code {code}"),
        );
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        Err(ToolkitError::process(
            format!("`{}` failed with {detail}", self.program),
            if stderr.is_empty() { None } else { Some(stderr) },
        ))
    }
}

#[cfg(test)]
mod tests {
    use camino::Utf8Path;

    use super::ArchiverInvocation;

    fn flags(values: &[&str]) -> Vec<String> {
        values.iter().map(|flag| (*flag).to_owned()).collect()
    }

    #[test]
    fn tar_extraction_places_mode_flags_first() {
        let invocation = ArchiverInvocation::tar_extract(
            Utf8Path::new("/tmp/node.tar.gz"),
            Utf8Path::new("/tmp/out"),
            &flags(&["xz"]),
        );
        assert_eq!(invocation.program, "tar");
        assert_eq!(
            invocation.args,
            ["xz", "-C", "/tmp/out", "-f", "/tmp/node.tar.gz"]
        );
        assert_eq!(invocation.cwd, None);
    }

    #[test]
    fn seven_zip_defaults_to_7z_but_honours_7zr() {
        let default = ArchiverInvocation::seven_zip_extract(
            Utf8Path::new("bundle.7z"),
            Utf8Path::new("/tmp/out"),
            None,
        );
        assert_eq!(default.program, "7z");
        assert_eq!(default.args, ["x", "bundle.7z", "-o/tmp/out", "-y"]);

        let standalone = ArchiverInvocation::seven_zip_extract(
            Utf8Path::new("bundle.7z"),
            Utf8Path::new("/tmp/out"),
            Some(Utf8Path::new("/opt/7zr")),
        );
        assert_eq!(standalone.program, "/opt/7zr");
    }

    #[test]
    fn xar_appends_caller_flags_after_the_archive() {
        let invocation = ArchiverInvocation::xar_extract(
            Utf8Path::new("pkg.xar"),
            Utf8Path::new("/tmp/out"),
            &flags(&["-v"]),
        );
        assert_eq!(
            invocation.args,
            ["-x", "-C", "/tmp/out", "-f", "pkg.xar", "-v"]
        );
    }

    #[test]
    fn unzip_runs_from_the_destination() {
        let invocation =
            ArchiverInvocation::zip_extract(Utf8Path::new("/tmp/kit.zip"), Utf8Path::new("/tmp/out"));
        assert_eq!(invocation.program, "unzip");
        assert_eq!(invocation.args, ["-o", "/tmp/kit.zip"]);
        assert_eq!(invocation.cwd.as_deref(), Some(Utf8Path::new("/tmp/out")));
    }

    #[test]
    fn cache_archives_travel_through_portable_tar() {
        let pack = ArchiverInvocation::cache_pack(
            Utf8Path::new("/tmp/entry.tgz"),
            Utf8Path::new("/work"),
            &flags(&["target", ".cargo"]),
        );
        assert_eq!(
            pack.args,
            ["-cz", "-f", "/tmp/entry.tgz", "-P", "-C", "/work", "target", ".cargo"]
        );

        let unpack =
            ArchiverInvocation::cache_unpack(Utf8Path::new("/tmp/entry.tgz"), Utf8Path::new("/work"));
        assert_eq!(
            unpack.args,
            ["-xz", "-f", "/tmp/entry.tgz", "-P", "-C", "/work"]
        );
    }

    #[tokio::test]
    async fn missing_archivers_surface_as_io_errors() {
        let invocation = ArchiverInvocation {
            program: "definitely-not-an-archiver".to_owned(),
            args: Vec::new(),
            cwd: None,
        };
        let error = invocation.run().await.expect_err("program does not exist");
        assert!(error.to_string().contains("definitely-not-an-archiver"));
    }

    #[tokio::test]
    #[cfg(unix)]
    async fn non_zero_exits_capture_stderr() {
        let invocation = ArchiverInvocation {
            program: "sh".to_owned(),
            args: vec!["-c".to_owned(), "echo boom >&2; exit 3".to_owned()],
            cwd: None,
        };
        let error = invocation.run().await.expect_err("script exits non-zero");
        let fault: shuttle_protocol::Fault = error.into();
        assert_eq!(fault.reason(), "Process: `sh` failed with exit code 3\nboom");
    }
}
