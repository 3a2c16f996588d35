use std::fs;
use std::path::Path;

use crate::simos::SimOS;

/// One line of a simulation script
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    NewProcess { size: u64, priority: i32 },
    Fork,
    Exit,
    Wait,
    DiskRead { disk: usize, file_name: String },
    DiskDone { disk: usize },
    Cpu,
    ReadyQueue,
    Memory,
    Disk { disk: usize },
    DiskQueue { disk: usize },
}

impl Command {
    fn disk(&self) -> Option<usize> {
        match self {
            Command::DiskRead { disk, .. }
            | Command::DiskDone { disk }
            | Command::Disk { disk }
            | Command::DiskQueue { disk } => Some(*disk),
            _ => None,
        }
    }
}

/// A parsed command with the script line it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    pub line: usize,
    pub command: Command,
}

pub fn parse_script(content: &str) -> Result<Vec<ScriptLine>, String> {
    let mut script = Vec::new();
    for (index, raw) in content.lines().enumerate() {
        let line = index + 1;
        let text = raw.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let command = parse_command(text).map_err(|e| format!("line {}: {}", line, e))?;
        script.push(ScriptLine { line, command });
    }
    Ok(script)
}

fn parse_command(text: &str) -> Result<Command, String> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let (name, args) = (tokens[0], &tokens[1..]);

    let expect = |count: usize| -> Result<(), String> {
        if args.len() != count {
            return Err(format!("'{}' takes {} arguments, got {}", name, count, args.len()));
        }
        Ok(())
    };

    let command = match name {
        "new" => {
            expect(2)?;
            Command::NewProcess {
                size: args[0].parse().map_err(|_| format!("Invalid size: {}", args[0]))?,
                priority: args[1].parse().map_err(|_| format!("Invalid priority: {}", args[1]))?,
            }
        }
        "fork" => expect(0).map(|_| Command::Fork)?,
        "exit" => expect(0).map(|_| Command::Exit)?,
        "wait" => expect(0).map(|_| Command::Wait)?,
        "read" => {
            expect(2)?;
            Command::DiskRead { disk: parse_disk(args[0])?, file_name: args[1].to_string() }
        }
        "done" => {
            expect(1)?;
            Command::DiskDone { disk: parse_disk(args[0])? }
        }
        "cpu" => expect(0).map(|_| Command::Cpu)?,
        "ready" => expect(0).map(|_| Command::ReadyQueue)?,
        "memory" => expect(0).map(|_| Command::Memory)?,
        "disk" => {
            expect(1)?;
            Command::Disk { disk: parse_disk(args[0])? }
        }
        "queue" => {
            expect(1)?;
            Command::DiskQueue { disk: parse_disk(args[0])? }
        }
        _ => return Err(format!("Unknown command: {}", name)),
    };
    Ok(command)
}

fn parse_disk(token: &str) -> Result<usize, String> {
    token.parse().map_err(|_| format!("Invalid disk number: {}", token))
}

/// Run a script against `sim`, returning one output line per query and per
/// process-creating event.
///
/// With `check` set, invariants are verified after every command.
pub fn execute(sim: &mut SimOS, script: &[ScriptLine], check: bool) -> Result<Vec<String>, String> {
    let mut output = Vec::new();

    for ScriptLine { line, command } in script {
        if let Some(disk) = command.disk() {
            if disk >= sim.disk_count() {
                return Err(format!(
                    "line {}: disk {} out of range (machine has {} disks)",
                    line,
                    disk,
                    sim.disk_count()
                ));
            }
        }

        match command {
            Command::NewProcess { size, priority } => {
                output.push(sim.new_process(*size, *priority).to_string());
            }
            Command::Fork => output.push(sim.sim_fork().to_string()),
            Command::Exit => sim.sim_exit(),
            Command::Wait => sim.sim_wait(),
            Command::DiskRead { disk, file_name } => sim.disk_read_request(*disk, file_name),
            Command::DiskDone { disk } => sim.disk_job_completed(*disk),
            Command::Cpu => output.push(sim.get_cpu().to_string()),
            Command::ReadyQueue => output.push(join(sim.get_ready_queue())),
            Command::Memory => output.push(join(sim.get_memory())),
            Command::Disk { disk } => {
                let request = sim.get_disk(*disk);
                if request.is_idle() {
                    output.push("idle".to_string());
                } else {
                    output.push(format!("{} {}", request.pid, request.file_name));
                }
            }
            Command::DiskQueue { disk } => {
                let queue = sim.get_disk_queue(*disk);
                output.push(join(queue.iter().map(|r| format!("{}:{}", r.pid, r.file_name))));
            }
        }

        if check {
            sim.verify().map_err(|e| format!("line {}: invariant violated: {}", line, e))?;
        }
    }

    Ok(output)
}

fn join<T: ToString>(items: impl IntoIterator<Item = T>) -> String {
    items.into_iter().map(|i| i.to_string()).collect::<Vec<_>>().join(" ")
}

pub fn read_script<P: AsRef<Path>>(path: P) -> Result<Vec<ScriptLine>, String> {
    let content = fs::read_to_string(path.as_ref())
        .map_err(|e| format!("Failed to read script file: {}", e))?;
    parse_script(&content)
}

pub fn write_results<P: AsRef<Path>>(path: P, results: &[String]) -> Result<(), String> {
    let mut content = results.join("\n");
    content.push('\n');
    fs::write(path.as_ref(), content).map_err(|e| format!("Failed to write output file: {}", e))
}
