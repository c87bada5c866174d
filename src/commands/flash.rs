//! Flash command: write first-stage and application images with boot headers
//!
//! Anything not supplied on the command line is asked for on the terminal.

use super::progress::IndicatifProgress;
use super::{print_device, CommandResult, Device};
use crate::cli::parse_hex_u32;
use spiboot_core::boot::{program_image_with, BootHeader, BootLayout, ImageSpec};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Values given on the command line
#[derive(Debug, Default)]
pub struct FlashArgs {
    pub ubl: Option<String>,
    pub app: Option<String>,
    pub entry: Option<u32>,
    pub load: Option<u32>,
}

/// What the user chose to write
#[derive(Debug, PartialEq, Eq)]
struct FlashPlan {
    ubl: Option<PathBuf>,
    app: Option<(PathBuf, u32, u32)>,
}

/// Line-oriented question/answer on a pair of streams
struct Prompter<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    fn ask(&mut self, question: &str) -> io::Result<String> {
        write!(self.output, "{}: ", question)?;
        self.output.flush()?;
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "input closed while waiting for an answer",
            ));
        }
        Ok(line.trim().to_string())
    }

    /// A file path, or `None` when the answer is "none"
    fn file(&mut self, given: Option<String>, question: &str) -> io::Result<Option<PathBuf>> {
        let answer = match given {
            Some(answer) => answer,
            None => self.ask(question)?,
        };
        if answer.is_empty() || answer.eq_ignore_ascii_case("none") {
            Ok(None)
        } else {
            Ok(Some(PathBuf::from(answer)))
        }
    }

    /// A hexadecimal address, asked again until it parses
    fn hex(&mut self, given: Option<u32>, question: &str) -> io::Result<u32> {
        if let Some(value) = given {
            return Ok(value);
        }
        loop {
            let answer = self.ask(question)?;
            match parse_hex_u32(&answer) {
                Ok(value) => return Ok(value),
                Err(_) => writeln!(self.output, "Not a hexadecimal address: {:?}", answer)?,
            }
        }
    }

    fn plan(&mut self, args: FlashArgs, layout: &BootLayout) -> io::Result<FlashPlan> {
        let ubl = self.file(args.ubl, "UBL file name (or \"none\")")?;
        let app = match self.file(args.app, "Application file name (or \"none\")")? {
            Some(path) => {
                let entry = self.hex(args.entry, "Application entry point (hex)")?;
                let load = self.hex(args.load, "Application load address (hex)")?;
                Some((
                    path,
                    layout.app_address_or_default(entry),
                    layout.app_address_or_default(load),
                ))
            }
            None => None,
        };
        Ok(FlashPlan { ubl, app })
    }
}

/// Write the requested boot images, prompting on the terminal for missing values
pub fn run_flash(device: &mut Device, layout: &BootLayout, args: FlashArgs) -> CommandResult {
    print_device(device);

    let stdin = io::stdin();
    let mut prompter = Prompter {
        input: stdin.lock(),
        output: io::stdout(),
    };
    let plan = prompter.plan(args, layout)?;
    if plan.ubl.is_none() && plan.app.is_none() {
        return Err("Nothing to write (both images are \"none\")".into());
    }

    if let Some(path) = &plan.ubl {
        let data = std::fs::read(path)?;
        println!(
            "Writing UBL {:?} ({} bytes) at 0x{:06X}",
            path,
            data.len(),
            layout.ubl_header_offset
        );
        let header = write_image(device, layout.ubl_header_offset, &ImageSpec::first_stage(&data))?;
        print_header("UBL", &header);
    }

    if let Some((path, entry, load)) = &plan.app {
        let data = std::fs::read(path)?;
        println!(
            "Writing application {:?} ({} bytes) at 0x{:06X}",
            path,
            data.len(),
            layout.app_header_offset
        );
        let spec = ImageSpec::application(&data, *entry, *load);
        let header = write_image(device, layout.app_header_offset, &spec)?;
        print_header("Application", &header);
    }

    println!("Flash complete");
    Ok(())
}

fn write_image(
    device: &mut Device,
    offset: u32,
    spec: &ImageSpec<'_>,
) -> Result<BootHeader, Box<dyn std::error::Error>> {
    let mut progress = IndicatifProgress::new();
    let header = program_image_with(device, offset, spec, &mut progress)?;
    progress.finish();
    Ok(header)
}

fn print_header(name: &str, header: &BootHeader) {
    println!(
        "  {} header: magic 0x{:08X}, entry 0x{:08X}, {} bytes from 0x{:06X} to 0x{:08X}",
        name,
        header.magic(),
        header.entry_point(),
        header.image_size(),
        header.source_offset(),
        header.load_address()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prompter(input: &str) -> Prompter<&[u8], Vec<u8>> {
        Prompter {
            input: input.as_bytes(),
            output: Vec::new(),
        }
    }

    #[test]
    fn test_everything_prompted() {
        let mut p = prompter("ubl.bin\nu-boot.bin\n0x81080000\n81080000\n");
        let plan = p.plan(FlashArgs::default(), &BootLayout::default()).unwrap();
        assert_eq!(
            plan,
            FlashPlan {
                ubl: Some(PathBuf::from("ubl.bin")),
                app: Some((PathBuf::from("u-boot.bin"), 0x8108_0000, 0x8108_0000)),
            }
        );
    }

    #[test]
    fn test_none_skips_stage() {
        let mut p = prompter("none\nNONE\n");
        let plan = p.plan(FlashArgs::default(), &BootLayout::default()).unwrap();
        assert_eq!(plan, FlashPlan { ubl: None, app: None });
    }

    #[test]
    fn test_command_line_values_are_not_prompted() {
        let mut p = prompter("");
        let args = FlashArgs {
            ubl: Some("none".into()),
            app: Some("app.bin".into()),
            entry: Some(0x8000_1000),
            load: Some(0x8000_0000),
        };
        let plan = p.plan(args, &BootLayout::default()).unwrap();
        assert_eq!(
            plan.app,
            Some((PathBuf::from("app.bin"), 0x8000_1000, 0x8000_0000))
        );
        assert!(p.output.is_empty());
    }

    #[test]
    fn test_address_outside_ram_uses_default() {
        let mut p = prompter("");
        let args = FlashArgs {
            ubl: Some("none".into()),
            app: Some("app.bin".into()),
            entry: Some(0x100),
            load: Some(0x8000_0000),
        };
        let plan = p.plan(args, &BootLayout::default()).unwrap();
        assert_eq!(
            plan.app,
            Some((PathBuf::from("app.bin"), 0x8108_0000, 0x8000_0000))
        );
    }

    #[test]
    fn test_bad_hex_is_asked_again() {
        let mut p = prompter("app.bin\nxyz\n80000000\n80000000\n");
        let args = FlashArgs {
            ubl: Some("none".into()),
            ..Default::default()
        };
        let plan = p.plan(args, &BootLayout::default()).unwrap();
        assert_eq!(
            plan.app,
            Some((PathBuf::from("app.bin"), 0x8000_0000, 0x8000_0000))
        );
        let output = String::from_utf8(p.output).unwrap();
        assert!(output.contains("Not a hexadecimal address"));
    }

    #[test]
    fn test_closed_input_fails() {
        let mut p = prompter("");
        assert!(p.plan(FlashArgs::default(), &BootLayout::default()).is_err());
    }
}
