pub mod events;
pub mod shark_attacks;

pub use events::get_events;
pub use shark_attacks::{
    create_shark_attack, delete_shark_attacks, get_shark_attack, import_shark_attacks,
    list_shark_attacks, update_shark_attack,
};
