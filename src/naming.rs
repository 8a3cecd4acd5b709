//! Output file naming from the meeting header.

use crate::error::FatalError;
use crate::model::MeetingHeader;
use chrono::{Datelike, NaiveDate};

/// Kind of meeting, derived from the designator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MeetingKind {
    /// Zastupitelstvo (council assembly).
    Council,
    /// Rada (executive board).
    Board,
    /// Budget session.
    Budget,
}

impl MeetingKind {
    /// Budget sessions match anywhere in the designator. Council and board
    /// match at the start of a word only, so place names ("Hradec") do not
    /// count. A designator naming both bodies is a board meeting.
    pub fn classify(designator: &str) -> Option<Self> {
        let lower = designator.to_lowercase();
        if lower.contains("rozpo") {
            return Some(MeetingKind::Budget);
        }
        let has_word = |prefix: &str| lower.split(|c: char| !c.is_alphanumeric()).any(|w| w.starts_with(prefix));
        if has_word("rad") {
            Some(MeetingKind::Board)
        } else if has_word("zastupit") {
            Some(MeetingKind::Council)
        } else {
            None
        }
    }

    fn prefix(self) -> &'static str {
        match self {
            MeetingKind::Council => "ZM_",
            MeetingKind::Board => "RM_",
            MeetingKind::Budget => "Rozpocet_",
        }
    }
}

/// First `d.m.yyyy` date in free text ("čtvrtek 12. 10. 2023 od 16:00").
pub fn parse_meeting_date(text: &str) -> Option<NaiveDate> {
    let compact = text.replace(". ", ".");
    compact.split_whitespace().find_map(|token| {
        let mut parts = token.trim_matches(|c: char| !c.is_ascii_digit()).split('.');
        let day = parts.next()?.parse().ok()?;
        let month = parts.next()?.parse().ok()?;
        let year: i32 = parts.next()?.parse().ok()?;
        if parts.next().is_some() || year < 1000 {
            return None;
        }
        NaiveDate::from_ymd_opt(year, month, day)
    })
}

/// Output file name for the meeting, `today` being the build date used by
/// budget documents.
pub fn output_file_name(header: &MeetingHeader, today: NaiveDate) -> Result<String, FatalError> {
    let kind = MeetingKind::classify(&header.designator)
        .ok_or_else(|| FatalError::format(format!("unknown meeting type {:?}", header.designator)))?;
    let date = parse_meeting_date(&header.time)
        .ok_or_else(|| FatalError::format(format!("no meeting date in {:?}", header.time)))?;
    Ok(match kind {
        MeetingKind::Budget => format!("{}{}_A4_{}.pdf", kind.prefix(), date.year(), today.format("%Y%m%d")),
        _ => format!("{}{}_A4.pdf", kind.prefix(), date.format("%Y-%m-%d")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(designator: &str, time: &str) -> MeetingHeader {
        MeetingHeader {
            designator: designator.into(),
            time: time.into(),
            ..MeetingHeader::default()
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 11, 2).unwrap()
    }

    #[test]
    fn council_meetings_use_zm_prefix() {
        let h = header("9. zasedání Zastupitelstva města", "čtvrtek 12. 10. 2023 od 16:00");
        assert_eq!(output_file_name(&h, today()).unwrap(), "ZM_2023-10-12_A4.pdf");
    }

    #[test]
    fn board_meetings_use_rm_prefix() {
        let h = header("115. schůze Rady města", "pondělí 4.9.2023 v 8:00");
        assert_eq!(output_file_name(&h, today()).unwrap(), "RM_2023-09-04_A4.pdf");
    }

    #[test]
    fn board_wins_over_council() {
        assert_eq!(MeetingKind::classify("Společné zasedání Rady a Zastupitelstva"), Some(MeetingKind::Board));
    }

    #[test]
    fn place_names_do_not_make_a_board_meeting() {
        let h = header("5. zasedání Zastupitelstva města Hradec Králové", "7. 6. 2023");
        assert_eq!(MeetingKind::classify(&h.designator), Some(MeetingKind::Council));
        assert_eq!(output_file_name(&h, today()).unwrap(), "ZM_2023-06-07_A4.pdf");
        assert_eq!(MeetingKind::classify("Radě města Hradec"), Some(MeetingKind::Board));
    }

    #[test]
    fn budget_meetings_carry_the_build_date() {
        let h = header("Rozpočtové opatření zastupitelstva", "1. 3. 2024");
        assert_eq!(output_file_name(&h, today()).unwrap(), "Rozpocet_2024_A4_20231102.pdf");
    }

    #[test]
    fn unknown_meetings_are_format_errors() {
        let h = header("Valná hromada spolku", "1. 3. 2024");
        assert!(matches!(output_file_name(&h, today()), Err(FatalError::WrongProgrammeFormat(_))));
        let h = header("Rada města", "bez data");
        assert!(output_file_name(&h, today()).is_err());
    }

    #[test]
    fn dates_are_validated() {
        assert_eq!(parse_meeting_date("31. 2. 2023"), None);
        assert_eq!(parse_meeting_date("(1.12.2023)"), NaiveDate::from_ymd_opt(2023, 12, 1));
    }
}
