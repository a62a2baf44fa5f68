pub mod confirmbox;
pub mod editor_help;
pub mod editor_palette;
pub mod gameover;
pub mod level;
pub mod menus;
pub mod pause;
pub mod quest;
