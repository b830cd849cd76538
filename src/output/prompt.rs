use std::io::{BufRead, Write};

use anyhow::{Context, Result};

use crate::ollama::InstalledModel;

const QUIT: &str = "q";

/// Prints a numbered menu of `models` and reads choices until the user picks
/// one, quits with `q`, or input ends. Returns the chosen model's name.
pub fn select_model<R, W>(
    models: &[InstalledModel],
    input: &mut R,
    output: &mut W,
) -> Result<Option<String>>
where
    R: BufRead,
    W: Write,
{
    if models.is_empty() {
        writeln!(output, "No models found.").context("write prompt")?;
        return Ok(None);
    }

    writeln!(output, "\nAvailable models:").context("write prompt")?;
    for (index, model) in models.iter().enumerate() {
        writeln!(output, "{}. {}", index + 1, model.line).context("write prompt")?;
    }

    let mut line = String::new();
    loop {
        write!(
            output,
            "\nEnter the number of the model to package (or '{QUIT}' to quit): "
        )
        .context("write prompt")?;
        output.flush().context("flush prompt")?;

        line.clear();
        if input.read_line(&mut line).context("read selection")? == 0 {
            return Ok(None);
        }

        let choice = line.trim();
        if choice.eq_ignore_ascii_case(QUIT) {
            return Ok(None);
        }

        match choice.parse::<usize>() {
            Ok(number) if (1..=models.len()).contains(&number) => {
                return Ok(Some(models[number - 1].name.clone()));
            }
            Ok(_) => writeln!(output, "Invalid selection. Please try again.")
                .context("write prompt")?,
            Err(_) => writeln!(output, "Please enter a number or '{QUIT}' to quit.")
                .context("write prompt")?,
        }
    }
}
