// Terminal frontend for the Zibbit live client.

pub mod tui;
