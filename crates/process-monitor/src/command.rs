//! Command description: what to run and how its streams are wired

use async_process::Command as AsyncCommand;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::pipe::{Pipe, Redirect};
use crate::platform::Platform;

/// A program with arguments, environment and working directory
///
/// Unlike `async_process::Command`, this type is `Clone` and can be prepared
/// any number of times.
#[derive(Debug, Clone)]
pub struct Command {
    /// The program to execute
    program: OsString,
    /// The arguments to pass to the program
    args: Vec<OsString>,
    /// Environment variables to set
    env: HashMap<OsString, OsString>,
    /// Working directory for the command
    current_dir: Option<PathBuf>,
    /// Whether to clear the environment before setting our vars
    env_clear: bool,
}

impl Command {
    /// Create a new command for the given program
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            env: HashMap::new(),
            current_dir: None,
            env_clear: false,
        }
    }

    /// Add an argument to the command
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Set an environment variable
    pub fn env<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.env
            .insert(key.as_ref().to_owned(), val.as_ref().to_owned());
        self
    }

    /// Clear all environment variables (except those explicitly set)
    pub fn env_clear(&mut self) -> &mut Self {
        self.env_clear = true;
        self
    }

    /// Set the working directory for the command
    pub fn current_dir<P: AsRef<Path>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.as_ref().to_owned());
        self
    }

    /// Get the program name
    pub fn get_program(&self) -> &OsStr {
        &self.program
    }

    /// Get the arguments
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Get the environment variables
    pub fn get_envs(&self) -> &HashMap<OsString, OsString> {
        &self.env
    }

    /// Get the current directory
    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Convert to an `async_process::Command` ready for stdio wiring
    pub fn prepare(&self) -> AsyncCommand {
        let mut cmd = AsyncCommand::new(&self.program);
        cmd.args(&self.args);

        if self.env_clear {
            cmd.env_clear();
        }
        for (key, val) in &self.env {
            cmd.env(key, val);
        }

        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }

        cmd
    }

    /// Create a builder for this command (for chaining)
    pub fn builder<S: AsRef<OsStr>>(program: S) -> CommandBuilder {
        CommandBuilder(Command::new(program))
    }
}

/// Builder wrapper for more ergonomic command construction
pub struct CommandBuilder(Command);

impl CommandBuilder {
    /// Add an argument
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.0.arg(arg);
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.0.args(args);
        self
    }

    /// Set an environment variable
    pub fn env<K, V>(mut self, key: K, val: V) -> Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.0.env(key, val);
        self
    }

    /// Set the working directory
    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.0.current_dir(dir);
        self
    }

    /// Build the command
    pub fn build(self) -> Command {
        self.0
    }
}

/// The thing to execute: a shell line or an already split command
#[derive(Debug, Clone)]
pub enum CommandLine {
    /// A line interpreted by the system shell, unless the platform bypasses it
    Shell(String),
    /// A program and its arguments, always executed directly
    Exec(Command),
}

impl CommandLine {
    /// Human readable form for logging
    pub fn display(&self) -> String {
        match self {
            CommandLine::Shell(line) => line.clone(),
            CommandLine::Exec(cmd) => {
                let mut out = cmd.get_program().to_string_lossy().into_owned();
                for arg in cmd.get_args() {
                    out.push(' ');
                    out.push_str(&arg.to_string_lossy());
                }
                out
            }
        }
    }

    /// The program the OS will be asked to execute on `platform`
    pub fn program(&self, platform: Platform) -> String {
        match self {
            CommandLine::Exec(cmd) => cmd.get_program().to_string_lossy().into_owned(),
            CommandLine::Shell(line) if platform.bypasses_shell() => {
                line.split_whitespace().next().unwrap_or_default().to_string()
            }
            CommandLine::Shell(_) => system_shell().0.to_string(),
        }
    }

    fn validate(&self) -> Result<()> {
        match self {
            CommandLine::Shell(line) if line.trim().is_empty() => {
                Err(Error::invalid_spec("shell line is empty"))
            }
            CommandLine::Exec(cmd) if cmd.get_program().is_empty() => {
                Err(Error::invalid_spec("program is empty"))
            }
            _ => Ok(()),
        }
    }

    /// Build the OS command for `platform`
    pub fn prepare(&self, platform: Platform) -> Result<AsyncCommand> {
        self.validate()?;
        match self {
            CommandLine::Exec(cmd) => Ok(cmd.prepare()),
            CommandLine::Shell(line) if platform.bypasses_shell() => {
                let mut words = line.split_whitespace();
                let program = words
                    .next()
                    .ok_or_else(|| Error::invalid_spec("shell line is empty"))?;
                let mut cmd = AsyncCommand::new(program);
                cmd.args(words);
                Ok(cmd)
            }
            CommandLine::Shell(line) => {
                let (shell, flag) = system_shell();
                let mut cmd = AsyncCommand::new(shell);
                cmd.arg(flag).arg(line);
                Ok(cmd)
            }
        }
    }
}

fn system_shell() -> (&'static str, &'static str) {
    if cfg!(windows) { ("cmd", "/C") } else { ("sh", "-c") }
}

impl From<Command> for CommandLine {
    fn from(cmd: Command) -> Self {
        CommandLine::Exec(cmd)
    }
}

/// Everything needed to launch and monitor one process
///
/// Built once by the caller and not changed afterwards; stdin is always a
/// pipe, stdout and stderr are pipes unless redirected to a file.
#[derive(Debug, Clone)]
pub struct ProcessSpec {
    command: CommandLine,
    drained: BTreeSet<Pipe>,
    redirects: BTreeMap<Pipe, Redirect>,
    platform: Platform,
}

impl ProcessSpec {
    /// Describe a process from any command line, draining stdout and stderr
    pub fn new(command: impl Into<CommandLine>) -> Self {
        Self {
            command: command.into(),
            drained: Pipe::OUTPUTS.into_iter().collect(),
            redirects: BTreeMap::new(),
            platform: Platform::current(),
        }
    }

    /// Describe a process run through the system shell
    pub fn shell(line: impl Into<String>) -> Self {
        Self::new(CommandLine::Shell(line.into()))
    }

    /// Restrict draining to the given slots
    pub fn drain<I: IntoIterator<Item = Pipe>>(mut self, pipes: I) -> Self {
        self.drained = pipes.into_iter().collect();
        self
    }

    /// Redirect an output slot to a file
    pub fn redirect(mut self, pipe: Pipe, path: impl Into<PathBuf>, append: bool) -> Self {
        self.redirects.insert(pipe, Redirect::file(path, append));
        self
    }

    /// Override the platform used to decide on shell bypass
    pub fn platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// The command line
    pub fn command(&self) -> &CommandLine {
        &self.command
    }

    /// Slots whose pipes are read by the poll loop
    pub fn drained(&self) -> &BTreeSet<Pipe> {
        &self.drained
    }

    /// Where `pipe` is connected; stdin is always a pipe
    pub fn redirect_for(&self, pipe: Pipe) -> &Redirect {
        static PIPE: Redirect = Redirect::Pipe;
        self.redirects.get(&pipe).unwrap_or(&PIPE)
    }

    /// The platform flag
    pub fn get_platform(&self) -> Platform {
        self.platform
    }

    /// Whether `pipe` is both requested and connected to a pipe
    pub fn is_drained(&self, pipe: Pipe) -> bool {
        self.drained.contains(&pipe) && self.redirect_for(pipe).is_pipe()
    }

    pub(crate) fn set_redirect(&mut self, pipe: Pipe, redirect: Redirect) {
        self.redirects.insert(pipe, redirect);
    }

    /// Check the description is structurally usable
    ///
    /// Redirect targets are not touched here; they are opened at launch.
    pub fn validate(&self) -> Result<()> {
        self.command.validate()?;
        if self.drained.contains(&Pipe::Stdin) {
            return Err(Error::invalid_spec("stdin cannot be drained"));
        }
        if self.redirects.contains_key(&Pipe::Stdin) {
            return Err(Error::invalid_spec("stdin cannot be redirected"));
        }
        for (pipe, redirect) in &self.redirects {
            if let Redirect::File { path, .. } = redirect {
                if path.as_os_str().is_empty() {
                    return Err(Error::invalid_spec(format!("{pipe} redirect path is empty")));
                }
            }
        }
        Ok(())
    }
}
