#[cfg(not(target_arch = "wasm32"))]
use colored::{Color, Colorize};

/// Prints the given string with the given color.
///
/// ## Example
/// ```
/// use wholebody::utils::utils_console::{wholebody_print, PrintMode, PrintColor};
/// wholebody_print("test", PrintMode::Println, PrintColor::Blue, false);
/// ```
#[cfg(not(target_arch = "wasm32"))]
pub fn wholebody_print(s: &str, mode: PrintMode, color: PrintColor, bolded: bool) {
    let mut string = s.normal();
    if bolded { string = string.bold() }
    if &color != &PrintColor::None {
        string = string.color(color.get_color());
    }
    match mode {
        PrintMode::Println => { println!("{}", string); }
        PrintMode::Print => { print!("{}", string); }
    }
}

#[cfg(target_arch = "wasm32")]
pub fn wholebody_print(s: &str, mode: PrintMode, _color: PrintColor, _bolded: bool) {
    match mode {
        PrintMode::Println => { println!("{}", s); }
        PrintMode::Print => { print!("{}", s); }
    }
}

pub fn wholebody_print_new_line() {
    wholebody_print("\n", PrintMode::Print, PrintColor::None, false);
}

/// Println will cause a new line after each output, while Print will not.
#[derive(Clone, Debug)]
pub enum PrintMode {
    Println,
    Print
}

/// Defines color for a wholebody print command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PrintColor {
    None,
    Blue,
    Green,
    Red,
    Yellow,
    Cyan,
    Magenta
}
#[cfg(not(target_arch = "wasm32"))]
impl PrintColor {
    pub fn get_color(&self) -> Color {
        match self {
            PrintColor::None => { Color::White }
            PrintColor::Blue => { Color::Blue }
            PrintColor::Green => { Color::Green }
            PrintColor::Red => { Color::Red }
            PrintColor::Yellow => { Color::Yellow }
            PrintColor::Cyan => { Color::Cyan }
            PrintColor::Magenta => { Color::Magenta }
        }
    }
}
