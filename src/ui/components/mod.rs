mod add_pattern_modal;
mod command_input;
mod input;
mod key_result;
mod pattern_row;
mod search_input;

pub use add_pattern_modal::{AddPatternModal, ModalEvent};
pub use command_input::{CommandEvent, CommandInput};
pub use key_result::KeyResult;
pub use pattern_row::{PatternRow, RowEvent};
pub use search_input::{SearchEvent, SearchInput};
