use crate::shell::command::Command;

pub fn parse_command(input: &str) -> Option<Command> {
    let tokens: Vec<&str> = input.trim().split_ascii_whitespace().collect();
    if tokens.is_empty() {
        return None;
    }

    let cmd = tokens[0];
    let args = &tokens[1..];

    match cmd {
        "help" => Some(Command::Help),
        "ls" => Some(Command::Ls(args.first().map(|s| s.to_string()))),
        "pwd" => Some(Command::Pwd),
        "mkdir" => args.first().map(|&name| Command::Mkdir(name.to_string())),
        "rmdir" | "rm" => args.first().map(|&name| Command::Rmdir(name.to_string())),
        "cd" => Some(Command::Cd(
            args.first().map(|s| s.to_string()).unwrap_or_else(|| "/".to_string()),
        )),
        "stat" => Some(Command::Stat(
            args.first().map(|s| s.to_string()).unwrap_or_else(|| ".".to_string()),
        )),
        "df" => Some(Command::Df),
        "format" => Some(Command::Format),
        "exit" | "quit" => Some(Command::Exit),
        _ => None,
    }
}
