use super::stats::MonthlyRecap;
use crate::model::student::Student;
use csv::{Terminator, Writer, WriterBuilder};

pub const ROSTER_HEADER: [&str; 10] = [
    "Name",
    "NIS",
    "Class",
    "Gender",
    "Address",
    "Phone",
    "Email",
    "Birth Date",
    "Homeroom Teacher",
    "Status",
];

pub const RECAP_HEADER: [&str; 9] = [
    "Name", "Class", "NIS", "Present", "Late", "Sick", "Absent", "Excused", "Total",
];

fn writer() -> Writer<Vec<u8>> {
    WriterBuilder::new()
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new())
}

fn finish(wtr: Writer<Vec<u8>>) -> Result<Vec<u8>, csv::Error> {
    wtr.into_inner().map_err(|e| e.into_error().into())
}

/// Header line plus one row per student.
pub fn roster_csv(students: &[Student]) -> Result<Vec<u8>, csv::Error> {
    let mut wtr = writer();
    wtr.write_record(ROSTER_HEADER)?;

    for s in students {
        let birth_date = s.birth_date.format("%Y-%m-%d").to_string();
        wtr.write_record([
            s.name.as_str(),
            s.nis.as_str(),
            s.class_name.as_str(),
            s.gender.as_ref(),
            s.address.as_str(),
            s.phone.as_str(),
            s.email.as_str(),
            birth_date.as_str(),
            s.homeroom_teacher.as_str(),
            s.status.as_ref(),
        ])?;
    }

    finish(wtr)
}

/// Per-student rows of a monthly recap.
pub fn recap_csv(recap: &MonthlyRecap) -> Result<Vec<u8>, csv::Error> {
    let mut wtr = writer();
    wtr.write_record(RECAP_HEADER)?;

    for row in &recap.students {
        let c = &row.counts;
        wtr.write_record([
            row.name.clone(),
            row.class_name.clone(),
            row.nis.clone(),
            c.present.to_string(),
            c.late.to_string(),
            c.sick.to_string(),
            c.absent.to_string(),
            c.excused.to_string(),
            c.total.to_string(),
        ])?;
    }

    finish(wtr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::status::AttendanceStatus::*;
    use crate::model::student::Gender;
    use crate::report::stats::fixtures::{record, student};
    use crate::report::stats::{month_range, monthly_recap};

    #[test]
    fn roster_has_header_plus_one_line_per_student() {
        let students = vec![
            student(1, "Ahmad Rizki Maulana", "XII IPA 1", Gender::Male),
            student(2, "Sari Dewi Anggraini", "XII IPA 1", Gender::Female),
            student(3, "Budi Santoso Wijaya", "XII IPA 2", Gender::Male),
        ];
        let bytes = roster_csv(&students).unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines.len(), students.len() + 1);
        assert_eq!(
            lines[0],
            "Name,NIS,Class,Gender,Address,Phone,Email,Birth Date,Homeroom Teacher,Status"
        );
        // the address contains commas, so it is quoted
        assert_eq!(
            lines[1],
            "Ahmad Rizki Maulana,12345001,XII IPA 1,L,\"Jl. Merdeka No. 123, Kebayoran Baru, Jakarta Selatan\",081234567890,student1@email.com,2005-03-15,Bu Sari Indrawati,Aktif"
        );
    }

    #[test]
    fn roster_fields_read_back_in_column_order() {
        let students = vec![student(2, "Sari Dewi Anggraini", "XII IPA 1", Gender::Female)];
        let bytes = roster_csv(&students).unwrap();
        let mut rdr = csv::Reader::from_reader(bytes.as_slice());
        let row = rdr.records().next().unwrap().unwrap();
        assert_eq!(&row[0], "Sari Dewi Anggraini");
        assert_eq!(&row[3], "P");
        assert_eq!(&row[4], "Jl. Merdeka No. 123, Kebayoran Baru, Jakarta Selatan");
        assert_eq!(&row[9], "Aktif");
    }

    #[test]
    fn empty_roster_is_just_the_header() {
        let text = String::from_utf8(roster_csv(&[]).unwrap()).unwrap();
        assert_eq!(text.lines().count(), 1);
    }

    #[test]
    fn recap_rows_follow_summary_order() {
        let students = vec![
            student(1, "Ahmad", "XII IPA 1", Gender::Male),
            student(2, "Sari", "XII IPA 1", Gender::Female),
        ];
        let records = vec![
            record(1, 1, "2026-10-01", Present),
            record(2, 2, "2026-10-01", Excused),
            record(3, 2, "2026-10-02", Present),
        ];
        let (first, last) = month_range("2026-10").unwrap();
        let recap = monthly_recap("2026-10", first, last, &records, &students);

        let text = String::from_utf8(recap_csv(&recap).unwrap()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Name,Class,NIS,Present,Late,Sick,Absent,Excused,Total",
                "Sari,XII IPA 1,12345002,1,0,0,0,1,2",
                "Ahmad,XII IPA 1,12345001,1,0,0,0,0,1",
            ]
        );
    }
}
