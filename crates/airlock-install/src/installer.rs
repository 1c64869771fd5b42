use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use airlock_log::Logger;

use crate::error::{Error, Result};

/// Exit status and combined output of one package install.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InstallOutcome {
    /// `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    pub output: String,
}

impl InstallOutcome {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    fn from_output(output: Output) -> Self {
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.trim().is_empty() {
            if !text.is_empty() && !text.ends_with('\n') {
                text.push('\n');
            }
            text.push_str(&stderr);
        }
        Self {
            status: output.status.code(),
            output: text,
        }
    }
}

/// Installs one extension package into a live extensions directory.
pub trait ExtensionInstaller {
    fn install(&self, package: &Path) -> Result<InstallOutcome>;
}

/// The editor's command-line interface, driven per package.
#[derive(Clone, Debug)]
pub struct CodeCli {
    program: PathBuf,
    extensions_dir: PathBuf,
}

impl CodeCli {
    pub fn new(program: impl Into<PathBuf>, extensions_dir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            extensions_dir: extensions_dir.into(),
        }
    }

    pub fn args(&self, package: &Path) -> Vec<OsString> {
        vec![
            "--install-extension".into(),
            package.as_os_str().to_owned(),
            "--force".into(),
            "--extensions-dir".into(),
            self.extensions_dir.as_os_str().to_owned(),
        ]
    }
}

impl ExtensionInstaller for CodeCli {
    fn install(&self, package: &Path) -> Result<InstallOutcome> {
        let output = Command::new(&self.program)
            .args(self.args(package))
            .output()
            .map_err(|e| Error::Installer {
                program: self.program.display().to_string(),
                source: e,
            })?;
        Ok(InstallOutcome::from_output(output))
    }
}

/// Every `.vsix` file beneath `dir`, sorted.
pub fn find_packages(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut packages = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in fs::read_dir(&current)? {
            let path = entry?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("vsix"))
            {
                packages.push(path);
            }
        }
    }
    packages.sort();
    Ok(packages)
}

/// Install `packages` in order, stopping at the first failure.
pub fn install_packages(
    installer: &dyn ExtensionInstaller,
    packages: &[PathBuf],
    log: &dyn Logger,
) -> Result<usize> {
    for package in packages {
        log.info(&format!("installing {}", package.display()));
        let outcome = installer.install(package)?;
        if !outcome.success() {
            let status = outcome
                .status
                .map_or_else(|| "a signal".to_string(), |code| format!("status {code}"));
            log.error(&format!(
                "install of {} exited with {status}:\n{}",
                package.display(),
                outcome.output.trim_end()
            ));
            return Err(Error::InstallFailed {
                package: package.clone(),
                status,
                output: outcome.output,
            });
        }
        if !outcome.output.trim().is_empty() {
            log.debug(outcome.output.trim_end());
        }
    }
    Ok(packages.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use airlock_log::NoopLogger;
    use std::cell::RefCell;
    use tempfile::tempdir;

    struct Scripted {
        statuses: RefCell<Vec<i32>>,
        seen: RefCell<Vec<PathBuf>>,
    }

    impl ExtensionInstaller for Scripted {
        fn install(&self, package: &Path) -> Result<InstallOutcome> {
            self.seen.borrow_mut().push(package.to_path_buf());
            let status = self.statuses.borrow_mut().remove(0);
            Ok(InstallOutcome {
                status: Some(status),
                output: format!("exit {status}"),
            })
        }
    }

    #[test]
    fn cli_arguments_name_package_and_target() {
        let cli = CodeCli::new("code", "/opt/ext");
        let args = cli.args(Path::new("/tmp/a.vsix"));
        assert_eq!(
            args,
            vec!["--install-extension", "/tmp/a.vsix", "--force", "--extensions-dir", "/opt/ext"]
        );
    }

    #[test]
    fn finds_nested_packages_only() {
        let dir = tempdir().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("b.vsix"), b"b").unwrap();
        fs::write(dir.path().join("nested/a.VSIX"), b"a").unwrap();
        fs::write(dir.path().join("readme.txt"), b"r").unwrap();

        let packages = find_packages(dir.path()).unwrap();
        assert_eq!(
            packages,
            vec![dir.path().join("b.vsix"), dir.path().join("nested/a.VSIX")]
        );
    }

    #[test]
    fn first_failure_stops_the_run() {
        let installer = Scripted {
            statuses: RefCell::new(vec![0, 2, 0]),
            seen: RefCell::new(Vec::new()),
        };
        let packages = vec![PathBuf::from("a.vsix"), PathBuf::from("b.vsix"), PathBuf::from("c.vsix")];

        let err = install_packages(&installer, &packages, &NoopLogger).unwrap_err();

        assert!(matches!(err, Error::InstallFailed { ref package, .. } if package == Path::new("b.vsix")));
        assert_eq!(installer.seen.borrow().len(), 2);
    }

    #[cfg(unix)]
    #[test]
    fn code_cli_captures_exit_status_and_output() {
        let dir = tempdir().unwrap();
        let script = dir.path().join("code");
        fs::write(&script, "#!/bin/sh\necho \"installing $2\"\nexit 3\n").unwrap();
        airlock_fs::make_executable(&script).unwrap();

        let outcome = CodeCli::new(&script, dir.path())
            .install(Path::new("pkg.vsix"))
            .unwrap();

        assert_eq!(outcome.status, Some(3));
        assert_eq!(outcome.output.trim(), "installing pkg.vsix");
    }

    #[test]
    fn missing_program_is_an_installer_error() {
        let dir = tempdir().unwrap();
        let err = CodeCli::new(dir.path().join("no-such-code"), dir.path())
            .install(Path::new("pkg.vsix"))
            .unwrap_err();
        assert!(matches!(err, Error::Installer { .. }));
    }
}
