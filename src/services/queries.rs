//! Read-side queries over the derived tables.

use crate::schema;
use crate::utils::yyyymmdd_to_date;
use diesel::dsl::max;
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Integer, Nullable, Text};
use diesel::SqliteConnection;

#[derive(Debug, Clone, PartialEq, Eq, QueryableByName)]
pub struct AbsentTeacher {
    #[diesel(sql_type = Text)]
    pub code: String,
    #[diesel(sql_type = BigInt)]
    pub absences: i64,
    #[diesel(sql_type = Nullable<Integer>)]
    pub last_absence: Option<i32>,
}

/// One affected lesson, codes already resolved.
#[derive(Debug, Clone, PartialEq, Eq, QueryableByName)]
pub struct LessonLine {
    #[diesel(sql_type = Integer)]
    pub date: i32,
    #[diesel(sql_type = Nullable<Text>)]
    pub period_raw: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub subject_raw: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub absent_teacher: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub old_room: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub new_room: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub info_flag: Option<String>,
    #[diesel(sql_type = Nullable<Text>)]
    pub group_label: Option<String>,
}

/// A teacher with the number of entries naming them as absent.
#[derive(Debug, Clone, PartialEq, Eq, QueryableByName)]
pub struct TeacherAbsences {
    #[diesel(sql_type = Text)]
    pub code: String,
    #[diesel(sql_type = BigInt)]
    pub absences: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeacherStats {
    pub code: String,
    pub total_absences: i64,
    /// Newest first, at most [`RECENT_ABSENCES`] lines.
    pub recent: Vec<LessonLine>,
}

/// What the `report` command prints.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReportView {
    #[default]
    Summary,
    AllTeachers,
    Search(String),
    Teacher(String),
}

pub const RECENT_ABSENCES: i64 = 10;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DerivedCounts {
    pub entries: i64,
    pub messages: i64,
    pub class_links: i64,
    pub teachers: i64,
    pub rooms: i64,
    pub classes: i64,
    pub subjects: i64,
}

const LESSON_COLUMNS: &str = "
SELECT s.date_yyyymmdd AS date,
       e.period_raw    AS period_raw,
       e.subject_raw   AS subject_raw,
       ta.code         AS absent_teacher,
       ro.code         AS old_room,
       rn.code         AS new_room,
       e.info_flag     AS info_flag,
       e.group_label   AS group_label
FROM substitution_entry e
JOIN substitutions s ON s.id = e.substitution_id
LEFT JOIN teacher ta ON ta.id = e.teacher_absent_id
LEFT JOIN room ro ON ro.id = e.room_old_id
LEFT JOIN room rn ON rn.id = e.room_new_id
";

/// Teachers most often named as absent, with the date they were last absent.
///
/// Only teachers with at least one absence are listed; [`all_teachers`]
/// includes the rest.
pub fn top_absent_teachers(conn: &mut SqliteConnection, limit: i64) -> QueryResult<Vec<AbsentTeacher>> {
    diesel::sql_query(
        "SELECT t.code AS code, COUNT(e.id) AS absences, MAX(s.date_yyyymmdd) AS last_absence
         FROM teacher t
         JOIN substitution_entry e ON e.teacher_absent_id = t.id
         JOIN substitutions s ON s.id = e.substitution_id
         GROUP BY t.id, t.code
         ORDER BY absences DESC, t.code ASC
         LIMIT ?",
    )
    .bind::<BigInt, _>(limit)
    .load(conn)
}

const TEACHER_ABSENCES: &str = "
SELECT t.code AS code, COUNT(e.id) AS absences
FROM teacher t
LEFT JOIN substitution_entry e ON e.teacher_absent_id = t.id
";

/// Every known teacher by code, including those never absent.
pub fn all_teachers(conn: &mut SqliteConnection) -> QueryResult<Vec<TeacherAbsences>> {
    diesel::sql_query(format!("{TEACHER_ABSENCES} GROUP BY t.id, t.code ORDER BY t.code ASC")).load(conn)
}

/// Teachers whose code contains `query` (ASCII case-insensitive), most absent first.
pub fn search_teachers(conn: &mut SqliteConnection, query: &str) -> QueryResult<Vec<TeacherAbsences>> {
    let escaped = query
        .trim()
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    diesel::sql_query(format!(
        "{TEACHER_ABSENCES} WHERE t.code LIKE ? ESCAPE '\\'
         GROUP BY t.id, t.code ORDER BY absences DESC, t.code ASC"
    ))
    .bind::<Text, _>(format!("%{escaped}%"))
    .load(conn)
}

/// Absence total and most recent absences of one teacher; `None` for an unknown code.
pub fn teacher_stats(conn: &mut SqliteConnection, code: &str) -> QueryResult<Option<TeacherStats>> {
    use schema::substitution_entry::dsl as E;
    use schema::teacher::dsl as T;

    let code = code.trim();
    let Some(teacher_id) = T::teacher
        .filter(T::code.eq(code))
        .select(T::id)
        .first::<i32>(conn)
        .optional()?
    else {
        return Ok(None);
    };

    let total_absences = E::substitution_entry
        .filter(E::teacher_absent_id.eq(teacher_id))
        .count()
        .get_result(conn)?;
    let recent = diesel::sql_query(format!(
        "{LESSON_COLUMNS} WHERE e.teacher_absent_id = ?
         ORDER BY s.date_yyyymmdd DESC, e.row_index ASC LIMIT ?"
    ))
    .bind::<Integer, _>(teacher_id)
    .bind::<BigInt, _>(RECENT_ABSENCES)
    .load(conn)?;

    Ok(Some(TeacherStats {
        code: code.to_string(),
        total_absences,
        recent,
    }))
}

/// Most recent cancelled lessons, newest day first.
pub fn cancelled_lessons(conn: &mut SqliteConnection, limit: i64) -> QueryResult<Vec<LessonLine>> {
    diesel::sql_query(format!(
        "{LESSON_COLUMNS} WHERE e.is_cancelled = 1 ORDER BY s.date_yyyymmdd DESC, e.row_index ASC LIMIT ?"
    ))
    .bind::<BigInt, _>(limit)
    .load(conn)
}

/// Cancelled lessons of one class on one day, in table order.
pub fn cancelled_for_class(
    conn: &mut SqliteConnection,
    class_code: &str,
    date_yyyymmdd: i32,
) -> QueryResult<Vec<LessonLine>> {
    diesel::sql_query(format!(
        "{LESSON_COLUMNS}
         JOIN entry_class ec ON ec.entry_id = e.id
         JOIN class c ON c.id = ec.class_id
         WHERE e.is_cancelled = 1 AND c.code = ? AND s.date_yyyymmdd = ?
         ORDER BY e.row_index ASC"
    ))
    .bind::<Text, _>(class_code.trim())
    .bind::<Integer, _>(date_yyyymmdd)
    .load(conn)
}

/// Lessons that moved to another room on one day.
pub fn room_changes_on(conn: &mut SqliteConnection, date_yyyymmdd: i32) -> QueryResult<Vec<LessonLine>> {
    diesel::sql_query(format!(
        "{LESSON_COLUMNS} WHERE e.is_room_change = 1 AND s.date_yyyymmdd = ? ORDER BY e.row_index ASC"
    ))
    .bind::<Integer, _>(date_yyyymmdd)
    .load(conn)
}

pub fn derived_counts(conn: &mut SqliteConnection) -> QueryResult<DerivedCounts> {
    Ok(DerivedCounts {
        entries: schema::substitution_entry::table.count().get_result(conn)?,
        messages: schema::message::table.count().get_result(conn)?,
        class_links: schema::entry_class::table.count().get_result(conn)?,
        teachers: schema::teacher::table.count().get_result(conn)?,
        rooms: schema::room::table.count().get_result(conn)?,
        classes: schema::class::table.count().get_result(conn)?,
        subjects: schema::subject::table.count().get_result(conn)?,
    })
}

/// Latest date present in the raw store.
pub fn latest_date(conn: &mut SqliteConnection) -> QueryResult<Option<i32>> {
    use schema::substitutions::dsl as S;
    S::substitutions.select(max(S::date_yyyymmdd)).first(conn)
}

fn or_dash(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}

fn display_date(date: i32) -> String {
    yyyymmdd_to_date(date)
        .map(|d| d.to_string())
        .unwrap_or_else(|| date.to_string())
}

fn lesson_line(line: &LessonLine) -> String {
    format!(
        "  {}  period {:<6} {:<6} {:<8} room {} -> {}  {}  {}",
        display_date(line.date),
        or_dash(&line.period_raw),
        or_dash(&line.subject_raw),
        or_dash(&line.absent_teacher),
        or_dash(&line.old_room),
        or_dash(&line.new_room),
        or_dash(&line.group_label),
        or_dash(&line.info_flag),
    )
}

fn teacher_line(t: &TeacherAbsences) -> String {
    format!("  {:<8} {:>4}", t.code, t.absences)
}

fn summary_lines(conn: &mut SqliteConnection, limit: i64) -> QueryResult<Vec<String>> {
    let counts = derived_counts(conn)?;
    let mut lines = vec![format!(
        "Derived tables: {} entries, {} messages, {} class links; {} teachers, {} rooms, {} classes, {} subjects",
        counts.entries,
        counts.messages,
        counts.class_links,
        counts.teachers,
        counts.rooms,
        counts.classes,
        counts.subjects
    )];

    lines.push(String::new());
    lines.push("Most absent teachers:".to_string());
    for t in top_absent_teachers(conn, limit)? {
        let last = t.last_absence.map(display_date).unwrap_or_else(|| "-".to_string());
        lines.push(format!("  {:<8} {:>4}  last {}", t.code, t.absences, last));
    }

    lines.push(String::new());
    lines.push("Recent cancellations:".to_string());
    lines.extend(cancelled_lessons(conn, limit)?.iter().map(lesson_line));

    if let Some(date) = latest_date(conn)? {
        lines.push(String::new());
        lines.push(format!("Room changes on {}:", display_date(date)));
        lines.extend(room_changes_on(conn, date)?.iter().map(lesson_line));
    }
    Ok(lines)
}

fn teacher_lines(conn: &mut SqliteConnection, code: &str) -> QueryResult<Vec<String>> {
    let Some(stats) = teacher_stats(conn, code)? else {
        return Ok(vec![format!("Unknown teacher: {}", code.trim())]);
    };
    let mut lines = vec![format!("Teacher {}: {} absence(s)", stats.code, stats.total_absences)];
    if !stats.recent.is_empty() {
        lines.push(String::new());
        lines.push("Most recent absences:".to_string());
        lines.extend(stats.recent.iter().map(lesson_line));
    }
    Ok(lines)
}

/// Human-readable text for one report view.
pub fn render_report(conn: &mut SqliteConnection, view: &ReportView, limit: i64) -> QueryResult<String> {
    let lines = match view {
        ReportView::Summary => summary_lines(conn, limit)?,
        ReportView::AllTeachers => {
            let mut lines = vec!["Teachers:".to_string()];
            lines.extend(all_teachers(conn)?.iter().map(teacher_line));
            lines
        }
        ReportView::Search(query) => {
            let mut lines = vec![format!("Teachers matching {:?}:", query.trim())];
            lines.extend(search_teachers(conn, query)?.iter().map(teacher_line));
            lines
        }
        ReportView::Teacher(code) => teacher_lines(conn, code)?,
    };
    let mut out = lines.join("\n");
    out.push('\n');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::normalize;
    use crate::services::raw::upsert_day;
    use crate::test_support::{fetched_at, fixture, memory_connection};

    fn normalized() -> SqliteConnection {
        let mut conn = memory_connection();
        upsert_day(&mut conn, 20251208, fetched_at(), &fixture("day-20251208.json")).unwrap();
        upsert_day(&mut conn, 20251209, fetched_at(), &fixture("day-20251209.json")).unwrap();
        normalize::run(&mut conn).unwrap();
        conn
    }

    #[test]
    fn keil_is_the_most_absent_teacher() {
        let mut conn = normalized();
        let top = top_absent_teachers(&mut conn, 10).unwrap();
        assert_eq!(
            top[0],
            AbsentTeacher {
                code: "KEIL".into(),
                absences: 2,
                last_absence: Some(20251208)
            }
        );
        let hema = top.iter().find(|t| t.code == "HEMA").unwrap();
        assert_eq!(hema.last_absence, Some(20251209));
        assert_eq!(top_absent_teachers(&mut conn, 1).unwrap().len(), 1);
    }

    #[test]
    fn cancellations_for_a_class_and_day() {
        let mut conn = normalized();
        let lines = cancelled_for_class(&mut conn, "10A BV", 20251208).unwrap();
        assert_eq!(lines.len(), 1);
        assert_eq!(lines[0].period_raw.as_deref(), Some("3"));
        assert_eq!(lines[0].absent_teacher.as_deref(), Some("KEIL"));

        assert!(cancelled_for_class(&mut conn, "12A BZ", 20251208).unwrap().is_empty());
        assert!(cancelled_for_class(&mut conn, "10A BV", 20251209).unwrap().is_empty());
    }

    #[test]
    fn recent_cancellations_and_room_changes() {
        let mut conn = normalized();
        let cancelled = cancelled_lessons(&mut conn, 10).unwrap();
        assert_eq!(cancelled.len(), 2);
        assert!(cancelled.iter().all(|l| l.date == 20251208));

        let moved = room_changes_on(&mut conn, 20251208).unwrap();
        let rooms: Vec<(Option<&str>, Option<&str>)> = moved
            .iter()
            .map(|l| (l.new_room.as_deref(), l.old_room.as_deref()))
            .collect();
        assert_eq!(rooms, vec![(Some("A302"), Some("B208")), (Some("A101"), Some("A101"))]);
    }

    #[test]
    fn counts_and_report() {
        let mut conn = normalized();
        let counts = derived_counts(&mut conn).unwrap();
        assert_eq!(counts.entries, 6);
        assert_eq!(counts.messages, 3);
        assert_eq!(counts.class_links, 6);
        assert_eq!(latest_date(&mut conn).unwrap(), Some(20251209));

        let report = render_report(&mut conn, &ReportView::Summary, 5).unwrap();
        assert!(report.starts_with("Derived tables: 6 entries"));
        assert!(report.contains("KEIL"));
        assert!(report.contains("Room changes on 2025-12-09:"));
    }

    #[test]
    fn all_teachers_include_those_never_absent() {
        let mut conn = normalized();
        let all: Vec<(String, i64)> = all_teachers(&mut conn)
            .unwrap()
            .into_iter()
            .map(|t| (t.code, t.absences))
            .collect();
        assert_eq!(
            all,
            vec![
                ("BADE".to_string(), 0),
                ("HEMA".to_string(), 1),
                ("KEIL".to_string(), 2),
                ("KING".to_string(), 1),
                ("MEYR".to_string(), 0),
            ]
        );
        let top = top_absent_teachers(&mut conn, 10).unwrap();
        assert!(top.iter().all(|t| t.absences > 0));
    }

    #[test]
    fn search_matches_substrings_most_absent_first() {
        let mut conn = normalized();
        let codes = |found: Vec<TeacherAbsences>| found.into_iter().map(|t| t.code).collect::<Vec<_>>();

        assert_eq!(codes(search_teachers(&mut conn, "k").unwrap()), vec!["KEIL", "KING"]);
        assert_eq!(
            codes(search_teachers(&mut conn, "E").unwrap()),
            vec!["KEIL", "HEMA", "BADE", "MEYR"]
        );
        assert!(search_teachers(&mut conn, "%").unwrap().is_empty());
        assert!(search_teachers(&mut conn, "K_").unwrap().is_empty());
    }

    #[test]
    fn stats_for_one_teacher() {
        let mut conn = normalized();
        let keil = teacher_stats(&mut conn, "KEIL").unwrap().unwrap();
        assert_eq!(keil.total_absences, 2);
        let periods: Vec<Option<&str>> = keil.recent.iter().map(|l| l.period_raw.as_deref()).collect();
        assert_eq!(periods, vec![Some("3"), Some("4")]);

        let bade = teacher_stats(&mut conn, "BADE").unwrap().unwrap();
        assert_eq!(bade.total_absences, 0);
        assert!(bade.recent.is_empty());

        assert_eq!(teacher_stats(&mut conn, "NOPE").unwrap(), None);
    }

    #[test]
    fn teacher_views_render() {
        let mut conn = normalized();
        let text = render_report(&mut conn, &ReportView::Teacher("KEIL".into()), 5).unwrap();
        assert!(text.starts_with("Teacher KEIL: 2 absence(s)"), "{}", text);
        assert!(text.contains("2025-12-08"));

        let text = render_report(&mut conn, &ReportView::Teacher("NOPE".into()), 5).unwrap();
        assert_eq!(text, "Unknown teacher: NOPE\n");

        let text = render_report(&mut conn, &ReportView::AllTeachers, 5).unwrap();
        assert_eq!(text.lines().count(), 6);

        let text = render_report(&mut conn, &ReportView::Search("ki".into()), 5).unwrap();
        assert!(text.contains("KING") && !text.contains("HEMA"));
    }
}
