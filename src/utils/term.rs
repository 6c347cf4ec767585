/// ANSI styling for console output. Pure functions, no shared state.

const END_FORMATTING: &str = "\x1b[0m";
const BOLD: &str = "\x1b[1m";
const UNDERLINE: &str = "\x1b[4m";
const RED: &str = "\x1b[31m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[93m";
const DIM: &str = "\x1b[2m";

pub fn bold_yellow_underline(text: &str) -> String {
    format!("{YELLOW}{BOLD}{UNDERLINE}{text}{END_FORMATTING}")
}

pub fn bold(text: &str) -> String {
    format!("{BOLD}{text}{END_FORMATTING}")
}

pub fn red(text: &str) -> String {
    format!("{RED}{text}{END_FORMATTING}")
}

pub fn green(text: &str) -> String {
    format!("{GREEN}{text}{END_FORMATTING}")
}

pub fn dim(text: &str) -> String {
    format!("{DIM}{text}{END_FORMATTING}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_styling_wraps_text() {
        assert_eq!(red("fail"), "\x1b[31mfail\x1b[0m");
        assert_eq!(green("ok"), "\x1b[32mok\x1b[0m");
        assert!(bold_yellow_underline("banner").ends_with("banner\x1b[0m"));
    }
}
