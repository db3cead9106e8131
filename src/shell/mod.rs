pub mod command;
pub mod parse;

use crate::shell::{
    command::{describe_error, execute_command},
    parse::parse_command,
};
use colored::*;
use crossterm::{
    cursor, execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
    terminal::{Clear, ClearType},
};
use log::warn;
use minidisk::{BlockDevice, DirEntry, FileSystem, FsError};
use reedline::{DefaultPrompt, DefaultPromptSegment, FileBackedHistory, Reedline, Signal};
use std::{io::stdout, path::PathBuf};

/// 一次交互会话：文件系统 + 显式的当前工作目录
pub struct Session<D: BlockDevice> {
    pub fs: FileSystem<D>,
    pub cwd: DirEntry,
    path: Vec<String>,
}

impl<D: BlockDevice> Session<D> {
    pub fn new(fs: FileSystem<D>) -> Self {
        let cwd = fs.root();
        Self {
            fs,
            cwd,
            path: Vec::new(),
        }
    }

    pub fn display_path(&self) -> String {
        format!("/{}", self.path.join("/"))
    }

    pub fn child_path(&self, name: &str) -> String {
        if self.path.is_empty() {
            format!("/{}", name)
        } else {
            format!("{}/{}", self.display_path(), name)
        }
    }

    pub fn reset_to_root(&mut self) {
        self.cwd = self.fs.root();
        self.path.clear();
    }

    /// 逐段切换目录，路径显示使用磁盘上的真实名字；任何一段失败都不改变当前目录
    pub fn change_dir(&mut self, target: &str) -> Result<(), FsError> {
        let (mut current, mut path) = if target.starts_with('/') {
            (self.fs.root(), Vec::new())
        } else {
            (self.cwd.clone(), self.path.clone())
        };

        for segment in target.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    current = self.fs.parent(&current)?;
                    path.pop();
                }
                name => {
                    current = self.fs.path_lookup(current, &[name])?;
                    path.push(current.name.clone());
                }
            }
        }

        self.cwd = current;
        self.path = path;
        Ok(())
    }
}

pub fn start_shell<D: BlockDevice>(fs: FileSystem<D>) {
    boot_banner();

    let username = whoami::username();
    let hostname = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());
    let mut session = Session::new(fs);

    println!(
        "{}",
        "Type 'help' for available commands. Use ↑↓ for history, Tab for auto-completion.\n"
            .bright_black()
    );

    // 初始化 reedline
    let history_path = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".minidisk_history");

    let mut line_editor = Reedline::create();
    match FileBackedHistory::with_file(100, history_path) {
        Ok(history) => line_editor = line_editor.with_history(Box::new(history)),
        Err(e) => warn!("shell history disabled: {}", e),
    }

    // 命令补全
    let commands = vec![
        "help", "ls", "pwd", "mkdir", "rmdir", "rm", "cd", "stat", "df", "format", "exit",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    let completer = reedline::DefaultCompleter::new_with_wordlen(commands, 2);
    line_editor = line_editor.with_completer(Box::new(completer));

    let right_prompt = "MiniDisk".bright_blue().bold().to_string();

    loop {
        let full_prompt = format!(
            "{}:{}",
            format!("{}@{}", username, hostname).green(),
            session.display_path().blue()
        );
        let prompt = DefaultPrompt::new(
            DefaultPromptSegment::Basic(full_prompt),
            DefaultPromptSegment::Basic(right_prompt.clone()),
        );

        let input = line_editor.read_line(&prompt);

        match input {
            Ok(Signal::Success(buffer)) => {
                let trimmed = buffer.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match parse_command(trimmed) {
                    Some(cmd) => {
                        if let Err(e) = execute_command(&cmd, &mut session) {
                            println!("{} {}", "❌ Error:".red().bold(), describe_error(e.as_ref()));
                        }
                        if matches!(cmd, command::Command::Exit) {
                            break;
                        }
                    }
                    None => println!(
                        "{}",
                        "⚠️  Unknown command. Type 'help' for command list.".yellow()
                    ),
                }
            }
            Ok(Signal::CtrlC) => {
                println!();
                continue;
            }
            Ok(Signal::CtrlD) => {
                println!("{}", "Exiting MiniDisk...".yellow());
                break;
            }
            #[allow(unreachable_patterns)]
            Ok(_) => continue,
            Err(e) => {
                println!("Error reading line: {}", e);
                break;
            }
        }
    }

    if let Err(e) = session.fs.unmount() {
        println!("{} {}", "❌ Error:".red().bold(), e);
    }
    println!("{}", "GoodBye!".bright_yellow());
}

/// 欢迎横幅
fn boot_banner() {
    let mut stdout = stdout();

    let _ = execute!(
        stdout,
        Clear(ClearType::All),
        cursor::MoveTo(0, 0),
        SetForegroundColor(Color::Cyan),
        Print(format!("Welcome to MiniDisk v{}\n", env!("CARGO_PKG_VERSION"))),
        ResetColor
    );
}
