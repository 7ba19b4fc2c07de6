//! Command resolution: turning (language, source) into a runnable command.
//!
//! Interpreted languages are staged to a temporary script file; compiled
//! languages are built synchronously in an isolated temporary directory. The
//! resolver never launches the resulting command itself.

use std::fmt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;

use thiserror::Error;
use tracing::debug;

use crate::config::ToolchainConfig;
use crate::lang::cleanup::Cleanup;

/// Languages the resolver knows how to stage and run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Python,
    JavaScript,
    Php,
    Perl,
    Java,
    C,
    Cpp,
}

impl Language {
    /// All supported languages, in display order.
    pub const ALL: [Language; 7] = [
        Language::Python,
        Language::JavaScript,
        Language::Php,
        Language::Perl,
        Language::Java,
        Language::C,
        Language::Cpp,
    ];

    /// Parses a wire-level language name. Returns `None` for anything the
    /// engine should report as unsupported.
    pub fn parse(name: &str) -> Option<Language> {
        match name.to_ascii_lowercase().as_str() {
            "python" => Some(Language::Python),
            "javascript" => Some(Language::JavaScript),
            "php" => Some(Language::Php),
            "perl" => Some(Language::Perl),
            "java" => Some(Language::Java),
            "c" => Some(Language::C),
            "c++" | "cpp" => Some(Language::Cpp),
            _ => None,
        }
    }

    /// Canonical wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Language::Python => "python",
            Language::JavaScript => "javascript",
            Language::Php => "php",
            Language::Perl => "perl",
            Language::Java => "java",
            Language::C => "c",
            Language::Cpp => "c++",
        }
    }

    /// Whether resolution involves a synchronous build step.
    pub fn needs_build(&self) -> bool {
        matches!(self, Language::Java | Language::C | Language::Cpp)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A runnable command: argv plus optional working directory.
///
/// Produced once per resolution and consumed once by the process supervisor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    /// Program and arguments; never empty.
    pub argv: Vec<String>,
    /// Working directory for the child, if any.
    pub cwd: Option<PathBuf>,
}

/// A resolved run: the command to launch and the cleanup releasing the
/// temporary resources staged for it.
#[derive(Debug)]
pub struct Resolution {
    pub command: CommandSpec,
    pub cleanup: Cleanup,
}

/// Errors produced while resolving a (language, source) pair.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The language name is not in the supported set.
    #[error("unsupported language: {0}")]
    Unsupported(String),

    /// The compiler exited nonzero. The diagnostic is the captured stderr
    /// (stdout when stderr is empty), verbatim.
    #[error("compiler reported errors")]
    Compile { diagnostic: String },

    /// Staging the source or invoking the compiler failed at the OS level.
    #[error("failed to stage source: {0}")]
    Stage(#[from] std::io::Error),
}

/// Resolves source code into runnable commands using configured toolchains.
pub struct CommandResolver {
    toolchains: ToolchainConfig,
}

impl CommandResolver {
    /// Creates a resolver over the given toolchain configuration.
    pub fn new(toolchains: ToolchainConfig) -> Self {
        Self { toolchains }
    }

    /// Resolves a language and source text into a launchable [`Resolution`].
    ///
    /// Compiled languages block on the compiler here; callers on an async
    /// path should run this on a blocking thread. Every error path releases
    /// the temporary resources it created before returning.
    pub fn resolve(&self, language: Language, source: &str) -> Result<Resolution, ResolveError> {
        match language {
            Language::Python => self.script(&self.toolchains.python, &["-u"], ".py", source),
            Language::JavaScript => self.script(&self.toolchains.node, &[], ".js", source),
            Language::Php => self.script(&self.toolchains.php, &["-f"], ".php", source),
            Language::Perl => self.script(&self.toolchains.perl, &[], ".pl", source),
            Language::Java => self.java(source),
            Language::C => self.compiled(&self.toolchains.cc, "main.c", source),
            Language::Cpp => self.compiled(&self.toolchains.cxx, "main.cpp", source),
        }
    }

    /// Parses the wire-level name and resolves, mapping unknown names to
    /// [`ResolveError::Unsupported`].
    pub fn resolve_named(&self, language: &str, source: &str) -> Result<Resolution, ResolveError> {
        let lang = Language::parse(language)
            .ok_or_else(|| ResolveError::Unsupported(language.to_string()))?;
        self.resolve(lang, source)
    }

    /// The binaries a language needs on PATH.
    pub fn required_binaries(&self, language: Language) -> Vec<&str> {
        match language {
            Language::Python => vec![self.toolchains.python.as_str()],
            Language::JavaScript => vec![self.toolchains.node.as_str()],
            Language::Php => vec![self.toolchains.php.as_str()],
            Language::Perl => vec![self.toolchains.perl.as_str()],
            Language::Java => vec![self.toolchains.javac.as_str(), self.toolchains.java.as_str()],
            Language::C => vec![self.toolchains.cc.as_str()],
            Language::Cpp => vec![self.toolchains.cxx.as_str()],
        }
    }

    /// Checks whether every binary the language needs exists on PATH.
    pub fn toolchain_available(&self, language: Language) -> bool {
        self.required_binaries(language)
            .iter()
            .all(|bin| which::which(bin).is_ok())
    }

    /// Stages source to a persistent temp script and builds the interpreter
    /// command line.
    fn script(
        &self,
        interpreter: &str,
        args: &[&str],
        suffix: &str,
        source: &str,
    ) -> Result<Resolution, ResolveError> {
        let mut file = tempfile::Builder::new()
            .prefix("polyrun-")
            .suffix(suffix)
            .tempfile()?;
        file.write_all(source.as_bytes())?;
        file.flush()?;
        let (_, path) = file.keep().map_err(|e| ResolveError::Stage(e.error))?;
        debug!(path = %path.display(), interpreter, "staged script");

        let mut argv = vec![interpreter.to_string()];
        argv.extend(args.iter().map(|a| a.to_string()));
        argv.push(path.to_string_lossy().into_owned());

        Ok(Resolution {
            command: CommandSpec { argv, cwd: None },
            cleanup: Cleanup::File(path),
        })
    }

    /// Writes the source into a fresh build directory.
    fn stage_dir(&self, file_name: &str, source: &str) -> Result<PathBuf, ResolveError> {
        let dir = tempfile::Builder::new()
            .prefix("polyrun-build-")
            .tempdir()?
            .keep();
        if let Err(e) = fs::write(dir.join(file_name), source) {
            let _ = Cleanup::Dir(dir).run();
            return Err(e.into());
        }
        Ok(dir)
    }

    /// Runs the compiler inside `dir`, capturing its output. On failure the
    /// build directory is removed before the error is returned.
    fn compile_in(&self, dir: &Path, argv: &[&str]) -> Result<(), ResolveError> {
        debug!(dir = %dir.display(), command = ?argv, "compiling");
        let output = Command::new(argv[0])
            .args(&argv[1..])
            .current_dir(dir)
            .output();
        let output = match output {
            Ok(output) => output,
            Err(e) => {
                let _ = Cleanup::Dir(dir.to_path_buf()).run();
                return Err(e.into());
            }
        };
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let diagnostic = if stderr.is_empty() {
                String::from_utf8_lossy(&output.stdout).into_owned()
            } else {
                stderr.into_owned()
            };
            let _ = Cleanup::Dir(dir.to_path_buf()).run();
            return Err(ResolveError::Compile { diagnostic });
        }
        Ok(())
    }

    fn java(&self, source: &str) -> Result<Resolution, ResolveError> {
        let dir = self.stage_dir("Main.java", source)?;
        self.compile_in(&dir, &[self.toolchains.javac.as_str(), "Main.java"])?;

        let classpath = dir.to_string_lossy().into_owned();
        Ok(Resolution {
            command: CommandSpec {
                argv: vec![
                    self.toolchains.java.clone(),
                    "-cp".to_string(),
                    classpath,
                    "Main".to_string(),
                ],
                cwd: Some(dir.clone()),
            },
            cleanup: Cleanup::Dir(dir),
        })
    }

    fn compiled(
        &self,
        compiler: &str,
        file_name: &str,
        source: &str,
    ) -> Result<Resolution, ResolveError> {
        let dir = self.stage_dir(file_name, source)?;
        self.compile_in(&dir, &[compiler, file_name, "-o", "main_exe"])?;

        let exe = dir.join("main_exe");
        Ok(Resolution {
            command: CommandSpec {
                argv: vec![exe.to_string_lossy().into_owned()],
                cwd: Some(dir.clone()),
            },
            cleanup: Cleanup::Dir(dir),
        })
    }
}
