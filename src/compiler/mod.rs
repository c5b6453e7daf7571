//! Compiler module - Source code compilation
//!
//! This module turns a materialized workspace into something runnable:
//! - Interpreted languages pass straight through to their run command
//! - Compiled languages run the toolchain inside the workspace first
//!
//! The toolchain runs as an async child process, so a slow compile only
//! suspends the request's own task.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{ExecError, Result};
use crate::languages::LanguageConfig;
use crate::runner::CommandSpec;
use crate::workspace::Workspace;

/// Result of a compilation attempt
#[derive(Debug)]
pub struct CompileResult {
    pub success: bool,
    pub message: Option<String>,
}

/// Run a compile command with `work_dir` as the working directory
pub async fn compile_in_dir(
    work_dir: &Path,
    compile_cmd: &[String],
    timeout_ms: Option<u64>,
) -> Result<CompileResult> {
    let Some((program, args)) = compile_cmd.split_first() else {
        return Ok(CompileResult {
            success: true,
            message: None,
        });
    };

    debug!("Compiling with {:?} in {:?}", compile_cmd, work_dir);

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .kill_on_drop(true);

    let output = match timeout_ms {
        Some(ms) => match tokio::time::timeout(Duration::from_millis(ms), command.output()).await {
            Ok(output) => output,
            Err(_) => {
                return Ok(CompileResult {
                    success: false,
                    message: Some("Compilation timed out".to_string()),
                })
            }
        },
        None => command.output().await,
    }
    .map_err(|e| ExecError::Compile(format!("Failed to run compiler `{}`: {}", program, e)))?;

    if output.status.success() {
        return Ok(CompileResult {
            success: true,
            message: None,
        });
    }

    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

    let error_msg = if !stderr.is_empty() {
        stderr
    } else if !stdout.is_empty() {
        stdout
    } else {
        match output.status.code() {
            Some(code) => format!("Compilation failed with exit code {}", code),
            None => "Compiler crashed".to_string(),
        }
    };

    Ok(CompileResult {
        success: false,
        message: Some(error_msg),
    })
}

/// Compile the workspace if the language needs it and return the command to run
pub async fn prepare(
    lang: &LanguageConfig,
    workspace: &Workspace,
    compile_timeout_ms: Option<u64>,
) -> Result<CommandSpec> {
    if let Some(compile_cmd) = &lang.compile_command {
        info!(
            language = %lang.id,
            source = %workspace.source_path().display(),
            "Compiling submission"
        );

        let result = compile_in_dir(workspace.path(), compile_cmd, compile_timeout_ms).await?;
        if !result.success {
            return Err(ExecError::Compile(result.message.unwrap_or_default()));
        }

        // javac names classes after their declarations, not the file
        if let Some(artifact) = workspace.artifact_path() {
            if !tokio::fs::try_exists(artifact).await.unwrap_or(false) {
                return Err(ExecError::Compile(format!(
                    "Compilation produced no {}",
                    artifact
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or_default()
                )));
            }
        }
    }

    Ok(CommandSpec::from_vec(&lang.run_command).with_work_dir(workspace.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::languages::{LanguageId, LanguageRegistry};

    fn shell_compiled(script: &str) -> LanguageConfig {
        LanguageConfig {
            id: LanguageId::Cpp,
            source_file: "Program.cpp".to_string(),
            artifact: Some("Program".to_string()),
            compile_command: Some(vec!["/bin/sh".into(), "-c".into(), script.into()]),
            run_command: vec!["./Program".to_string()],
        }
    }

    #[tokio::test]
    async fn test_interpreted_language_passes_through() {
        let root = tempfile::tempdir().unwrap();
        let registry = LanguageRegistry::builtin().unwrap();
        let python = registry.resolve(1).unwrap();
        let ws = Workspace::materialize(root.path(), 1, python, "print(1)")
            .await
            .unwrap();

        let cmd = prepare(python, &ws, None).await.unwrap();
        assert_eq!(cmd.to_vec(), vec!["python3", "Program.py"]);
        assert_eq!(cmd.work_dir.as_deref(), Some(ws.path()));
    }

    #[tokio::test]
    async fn test_compile_runs_in_workspace() {
        let root = tempfile::tempdir().unwrap();
        let lang = shell_compiled("cp Program.cpp Program");
        let ws = Workspace::materialize(root.path(), 2, &lang, "source")
            .await
            .unwrap();

        let cmd = prepare(&lang, &ws, None).await.unwrap();
        assert_eq!(cmd.program, "./Program");
        assert_eq!(
            std::fs::read_to_string(ws.artifact_path().unwrap()).unwrap(),
            "source"
        );
    }

    #[tokio::test]
    async fn test_missing_artifact_is_compile_error() {
        let root = tempfile::tempdir().unwrap();
        let lang = shell_compiled("touch Main.class");
        let ws = Workspace::materialize(root.path(), 7, &lang, "x").await.unwrap();

        match prepare(&lang, &ws, None).await {
            Err(ExecError::Compile(msg)) => assert_eq!(msg, "Compilation produced no Program"),
            other => panic!("expected compile error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_compile_error_carries_diagnostics() {
        let root = tempfile::tempdir().unwrap();
        let lang = shell_compiled("echo 'error: expected ;' >&2; exit 1");
        let ws = Workspace::materialize(root.path(), 3, &lang, "x").await.unwrap();

        match prepare(&lang, &ws, None).await {
            Err(ExecError::Compile(msg)) => assert_eq!(msg, "error: expected ;\n"),
            other => panic!("expected compile error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_silent_compile_failure_reports_exit_code() {
        let root = tempfile::tempdir().unwrap();
        let lang = shell_compiled("exit 4");
        let ws = Workspace::materialize(root.path(), 4, &lang, "x").await.unwrap();

        let result = compile_in_dir(ws.path(), lang.compile_command.as_ref().unwrap(), None)
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(
            result.message.as_deref(),
            Some("Compilation failed with exit code 4")
        );
    }

    #[tokio::test]
    async fn test_missing_toolchain() {
        let root = tempfile::tempdir().unwrap();
        let mut lang = shell_compiled("true");
        lang.compile_command = Some(vec!["no-such-compiler-xyz".into()]);
        let ws = Workspace::materialize(root.path(), 5, &lang, "x").await.unwrap();

        match prepare(&lang, &ws, None).await {
            Err(ExecError::Compile(msg)) => {
                assert!(msg.starts_with("Failed to run compiler `no-such-compiler-xyz`"))
            }
            other => panic!("expected compile error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_compile_timeout() {
        let root = tempfile::tempdir().unwrap();
        let lang = shell_compiled("sleep 10");
        let ws = Workspace::materialize(root.path(), 6, &lang, "x").await.unwrap();

        match prepare(&lang, &ws, Some(100)).await {
            Err(ExecError::Compile(msg)) => assert_eq!(msg, "Compilation timed out"),
            other => panic!("expected compile timeout, got {:?}", other),
        }
    }
}
