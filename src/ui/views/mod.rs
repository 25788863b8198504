mod pattern_detail;
mod pattern_list;

pub use pattern_detail::PatternDetailView;
pub use pattern_list::PatternListView;
