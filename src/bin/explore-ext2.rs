//! Interactive explorer for ext2 disk images: list partitions, mount
//! one, walk the tree, and copy files out to the host.

use std::fs::File;
use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use ext2_explorer::{list_partitions, FileSource, FileSystem, Partition, Session};

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let disk_path = match &args[..] {
        [_, disk_path] => disk_path.clone(),
        _ => {
            eprintln!("Usage: {} <disk_or_image>", args[0]);
            std::process::exit(1);
        }
    };

    let mut disk = FileSource::open(&disk_path)
        .with_context(|| format!("cannot open disk image {disk_path}"))?;
    let partitions = list_partitions(&mut disk).context("cannot read the partition table")?;
    drop(disk);

    print_partitions(&partitions);
    println!("Commands: partitions, mount <n>, ls, cd <name>, info, save <name> <dest>, help, quit");

    let mut session: Option<Session<FileSource>> = None;
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let Some(line) = stdin.lock().lines().next() else {
            break;
        };
        let line = line?;
        let words = tokenize(&line);
        let words: Vec<&str> = words.iter().map(String::as_str).collect();

        match words.as_slice() {
            [] => {}
            ["quit" | "exit"] => break,
            ["help"] => {
                println!("partitions          list MBR partitions");
                println!("mount <n>           mount partition n (1-based)");
                println!("ls                  list the current directory");
                println!("cd <name>           enter a directory ('..' to go up)");
                println!("info                show filesystem details");
                println!("save <name> <dest>  copy a file out to a host path");
                println!("quit                leave");
            }
            ["partitions"] => print_partitions(&partitions),
            ["mount", n] => match mount(&disk_path, &partitions, n) {
                Ok(new_session) => {
                    println!("mounted partition {n}");
                    session = Some(new_session);
                }
                // A failed mount leaves any previous session in place.
                Err(e) => eprintln!("mount failed: {e:#}"),
            },
            ["ls"] => with_session(&mut session, |s| {
                let children = s.list_children()?;
                println!("{:<10} {:<6} NAME", "INODE", "TYPE");
                for child in children {
                    println!(
                        "{:<10} {:<6} {}",
                        child.inode.0,
                        type_label(&child),
                        child.name
                    );
                }
                Ok(())
            }),
            ["cd", name] => with_session(&mut session, |s| {
                s.change_directory(name)?;
                Ok(())
            }),
            ["info"] => with_session(&mut session, |s| {
                let sb = s.superblock();
                let inodes_count = sb.inodes_count;
                let blocks_count = sb.blocks_count;
                let free_blocks = sb.free_blocks_count;
                let free_inodes = sb.free_inodes_count;
                println!("volume name:  {}", sb.volume_name());
                println!("uuid:         {:?}", sb.uuid);
                println!("block size:   {}", sb.block_size());
                println!("blocks:       {blocks_count} ({free_blocks} free)");
                println!("inodes:       {inodes_count} ({free_inodes} free)");
                println!("clean:        {}", sb.is_clean());
                println!("current dir:  inode {}", s.current_directory().0);
                Ok(())
            }),
            ["save", name, dest] => with_session(&mut session, |s| {
                let mut sink =
                    File::create(dest).with_context(|| format!("cannot create {dest}"))?;
                // Absolute names resolve from the root; bare names from
                // the current directory.
                let written = if name.starts_with('/') {
                    let (_, inode) = s.resolve_path(name)?;
                    if !inode.is_regular_file() {
                        anyhow::bail!("not a regular file: {name}");
                    }
                    s.filesystem().extract_to(&inode, &mut sink)?
                } else {
                    s.extract_file(name, &mut sink)?
                };
                println!("wrote {written} bytes to {dest}");
                Ok(())
            }),
            _ => eprintln!("unrecognized command; try 'help'"),
        }
    }

    Ok(())
}

fn mount(
    disk_path: &str,
    partitions: &[Partition],
    n: &str,
) -> Result<Session<FileSource>> {
    let n: usize = n.parse().context("partition number must be an integer")?;
    let partition = partitions
        .get(n.checked_sub(1).context("partition numbers start at 1")?)
        .context("no such partition")?;
    let source = FileSource::open(disk_path)
        .with_context(|| format!("cannot reopen disk image {disk_path}"))?;
    Ok(FileSystem::mount(source, partition)?)
}

fn with_session<F>(session: &mut Option<Session<FileSource>>, func: F)
where
    F: FnOnce(&mut Session<FileSource>) -> Result<()>,
{
    match session {
        Some(session) => {
            if let Err(e) = func(session) {
                eprintln!("error: {e:#}");
            }
        }
        None => eprintln!("no filesystem mounted; use 'mount <n>' first"),
    }
}

fn print_partitions(partitions: &[Partition]) {
    println!("{:<8} {:<14} {:<14} {:<6}", "NUMBER", "OFFSET (MiB)", "SIZE (MiB)", "TYPE");
    for (i, p) in partitions.iter().enumerate() {
        println!(
            "{:<8} {:<14.2} {:<14.2} {:#04x}",
            i + 1,
            p.offset as f64 / (1024.0 * 1024.0),
            p.length as f64 / (1024.0 * 1024.0),
            p.partition_type
        );
    }
}

fn type_label(child: &ext2_explorer::Child) -> &'static str {
    use ext2_explorer::DirectoryEntryFileType::*;
    match child.file_type {
        RegularFile => "file",
        Directory => "dir",
        SymbolicLink => "link",
        CharacterDevice => "cdev",
        BlockDevice => "bdev",
        Fifo => "fifo",
        Socket => "sock",
        Unknown => "?",
    }
}

/// Splits a command line on whitespace, keeping double-quoted spans
/// together so names with spaces survive.
fn tokenize(line: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    for c in line.chars() {
        match c {
            '"' => in_quotes = !in_quotes,
            c if c.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    words.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
}
