use std::error::Error;
use std::process::Command;

fn run(path: &str) -> Result<(String, String), Box<dyn Error>> {
    let output = Command::new(env!("CARGO_BIN_EXE_nano")).arg(path).output()?;
    Ok((
        std::str::from_utf8(&output.stdout)?.to_string(),
        std::str::from_utf8(&output.stderr)?.to_string(),
    ))
}

#[test]
fn interpret_recursive_factorial() -> Result<(), Box<dyn Error>> {
    let (stdout, stderr) = run("./demos/fact.nano")?;
    assert_eq!(stdout, "120\n");
    assert_eq!(stderr, "");
    Ok(())
}

#[test]
fn interpret_class_inheritance() -> Result<(), Box<dyn Error>> {
    let (stdout, stderr) = run("./demos/classes.nano")?;
    assert_eq!(stdout, "200 100\n");
    assert_eq!(stderr, "");
    Ok(())
}

#[test]
fn interpret_arithmetic() -> Result<(), Box<dyn Error>> {
    let (stdout, stderr) = run("./demos/arithmetic.nano")?;
    assert_eq!(stdout, "6\n");
    assert_eq!(stderr, "");
    Ok(())
}

#[test]
fn interpret_range_literal() -> Result<(), Box<dyn Error>> {
    let (stdout, stderr) = run("./demos/ranges.nano")?;
    assert_eq!(stdout, "4 1 4\n");
    assert_eq!(stderr, "");
    Ok(())
}

#[test]
fn interpret_dict_mutation() -> Result<(), Box<dyn Error>> {
    let (stdout, stderr) = run("./demos/dict.nano")?;
    assert_eq!(stdout, "31\n");
    assert_eq!(stderr, "");
    Ok(())
}
