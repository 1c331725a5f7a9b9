use std::io::Write;

use crossterm::{queue, style};

use crate::config::KeyBindings;

/// Key hints for the player's top bar, in display order.
pub fn hint_items(keys: &KeyBindings) -> Vec<String> {
    vec![
        format!("[{}] stage", keys.next_stage),
        format!(
            "[{}/{}/{}/{}] idle/happy/sad/dead",
            keys.idle, keys.happy, keys.sad, keys.dead
        ),
        format!("[{}] poke", keys.interact),
        format!("[{}/{}] level", keys.level_up, keys.level_down),
        format!("[{}] quit", keys.quit),
    ]
}

/// Print a hint, bolding any text inside `[...]` brackets.
/// Text outside brackets is printed dim.
pub fn print_menu_item(out: &mut impl Write, item: &str) -> anyhow::Result<()> {
    let mut rest = item;
    while !rest.is_empty() {
        let Some(open) = rest.find('[') else {
            queue!(
                out,
                style::SetAttribute(style::Attribute::Dim),
                style::Print(rest),
                style::SetAttribute(style::Attribute::Reset),
            )?;
            break;
        };
        if open > 0 {
            queue!(
                out,
                style::SetAttribute(style::Attribute::Dim),
                style::Print(&rest[..open]),
                style::SetAttribute(style::Attribute::Reset),
            )?;
        }
        rest = &rest[open..];
        let Some(close) = rest.find(']') else {
            queue!(out, style::Print(rest))?;
            break;
        };
        queue!(
            out,
            style::SetAttribute(style::Attribute::Bold),
            style::Print(&rest[..=close]),
            style::SetAttribute(style::Attribute::Reset),
        )?;
        rest = &rest[close + 1..];
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hints_follow_the_bindings() {
        let keys = KeyBindings {
            quit: "Esc".into(),
            ..Default::default()
        };
        let items = hint_items(&keys);
        assert_eq!(items[0], "[s] stage");
        assert_eq!(items[1], "[1/2/3/4] idle/happy/sad/dead");
        assert_eq!(items.last().map(String::as_str), Some("[Esc] quit"));
    }

    #[test]
    fn brackets_are_printed_in_full() {
        let mut out = Vec::new();
        print_menu_item(&mut out, "[q] quit").unwrap();
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("[q]"));
        assert!(printed.contains(" quit"));
    }
}
