use colored::*;
use dialoguer::Confirm;
use indicatif::{ProgressBar, ProgressStyle};
use std::{error::Error, time::Duration};

use minidisk::{BlockDevice, FsError};

use crate::shell::Session;

#[derive(Debug)]
pub enum Command {
    Help,
    Ls(Option<String>),
    Pwd,
    Mkdir(String),
    Rmdir(String),
    Cd(String),
    Stat(String),
    Df,
    Format,
    Exit,
}

pub fn execute_command<D: BlockDevice>(
    cmd: &Command,
    session: &mut Session<D>,
) -> Result<(), Box<dyn Error>> {
    match cmd {
        Command::Help => print_help(),
        Command::Ls(path) => {
            let dir = match path {
                Some(p) => session.fs.resolve(&session.cwd, p)?,
                None => session.cwd.clone(),
            };
            println!("📂  .");
            println!("📁  ..");
            for entry in session.fs.list(&dir)? {
                println!("📁  {}", entry.name.blue().bold());
            }
        }
        Command::Pwd => println!("📍 {}", session.display_path().cyan()),
        Command::Mkdir(name) => {
            session.fs.mkdir(&session.cwd, name)?;
            println!(
                "✅ Created directory: {}",
                session.child_path(name).green()
            );
        }
        Command::Rmdir(name) => {
            session.fs.rm(&session.cwd, name)?;
            println!(
                "🗑️ Removed directory: {}",
                session.child_path(name).red()
            );
        }
        Command::Cd(path) => {
            session.change_dir(path)?;
            println!("📂 Moved to {}", session.display_path().blue());
        }
        Command::Stat(path) => {
            let entry = session.fs.resolve(&session.cwd, path)?;
            let inode = session.fs.stat(&entry)?;
            let pointers: Vec<String> = inode
                .blocks()
                .map(|(slot, ptr)| format!("{}:{}", slot, ptr))
                .collect();
            println!(
                "{}\n{}: {}\n{}: {}\n{}: {:?}\n{}: {}\n{}: [{}]\n",
                "📊 Inode Info".bright_yellow().bold(),
                "Name".blue(),
                entry.name,
                "Inode".blue(),
                inode.index(),
                "Type".blue(),
                inode.inode_type,
                "Blocks".blue(),
                inode.block_count(),
                "Pointers".blue(),
                pointers.join(", ")
            );
        }
        Command::Df => {
            let usage = session.fs.usage()?;
            println!(
                "{}\n{}: {}/{} used\n{}: {}/{} used\n",
                "💽 Disk Usage".bright_yellow().bold(),
                "Inodes".blue(),
                usage.inodes_used,
                usage.inodes_total,
                "Blocks".blue(),
                usage.blocks_used,
                usage.blocks_total
            );
        }
        Command::Format => {
            let confirmed = Confirm::new()
                .with_prompt("Format the virtual disk? All directories will be lost")
                .default(false)
                .interact()?;
            if !confirmed {
                println!("{}", "Format cancelled.".yellow());
                return Ok(());
            }

            println!("💾 Formatting virtual disk...");
            let pb = ProgressBar::new_spinner();
            pb.set_style(ProgressStyle::with_template("{spinner:.green} {msg}")?);
            pb.enable_steady_tick(Duration::from_millis(80));
            pb.set_message("writing layout");

            let block_count = session.fs.super_block().block_count;
            match session.fs.reformat(block_count) {
                Ok(()) => pb.finish_with_message("✅ Disk formatted successfully!"),
                Err(e) => {
                    pb.abandon_with_message("❌ Format failed");
                    return Err(e.into());
                }
            }
            session.reset_to_root();
        }
        Command::Exit => println!("{}", "👋 Exiting MiniDisk shell...".yellow().bold()),
    }

    Ok(())
}

/// 给用户看的错误提示：预期内的错误用黄色，其余用红色
pub fn describe_error(e: &(dyn Error + 'static)) -> ColoredString {
    match e.downcast_ref::<FsError>() {
        Some(fs_err) if fs_err.is_expected() => fs_err.to_string().yellow(),
        _ => e.to_string().red(),
    }
}

fn print_help() {
    println!("{}", "📘 MiniDisk Commands".bright_cyan().bold());
    println!(
        "{}",
        "
  ls [path]          List directory entries
  pwd                Print current path
  mkdir <dir>        Create directory
  rmdir <dir>        Remove empty directory (alias: rm)
  cd <path>          Change directory (supports /, . and ..)
  stat [path]        Show inode info
  df                 Show inode and block usage
  format             Format virtual disk
  help               Show this help message
  exit               Quit the shell
"
        .bright_black()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use minidisk::{FileSystem, MemDisk};

    fn session() -> Session<MemDisk> {
        Session::new(FileSystem::format(MemDisk::new(), 16).unwrap())
    }

    #[test]
    fn mkdir_cd_and_rmdir() {
        let mut s = session();
        execute_command(&Command::Mkdir("docs".into()), &mut s).unwrap();
        execute_command(&Command::Cd("DOCS".into()), &mut s).unwrap();
        assert_eq!(s.display_path(), "/docs");

        execute_command(&Command::Cd("..".into()), &mut s).unwrap();
        assert_eq!(s.display_path(), "/");
        execute_command(&Command::Rmdir("docs".into()), &mut s).unwrap();
        assert!(s.fs.list(&s.cwd).unwrap().is_empty());
    }

    #[test]
    fn failed_cd_keeps_current_directory() {
        let mut s = session();
        let err = execute_command(&Command::Cd("missing".into()), &mut s).unwrap_err();
        assert!(err.downcast_ref::<FsError>().is_some());
        assert_eq!(s.display_path(), "/");
    }
}
