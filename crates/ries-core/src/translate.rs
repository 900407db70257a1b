//! FoR → FoE translation layer
//!
//! Field-of-research codes are remapped to field-of-education codes with a
//! fixed table. When any 4-digit code maps, the 2-digit apportionment is
//! rebuilt by truncating the mapped 4-digit codes. Each digit group is then
//! renormalized to 100 and repeated codes are merged.

use std::sync::LazyLock;

use rustc_hash::FxHashMap;

use crate::model::{Apportionment, Digits, Paper};
use crate::normalize::normalize;

static FOR_TO_FOE: &[(&str, &str)] = &[
    ("30", "05"), ("31", "01"), ("32", "06"), ("33", "04"), ("34", "01"),
    ("35", "08"), ("36", "10"), ("37", "01"), ("38", "09"), ("39", "07"),
    ("40", "03"), ("41", "05"), ("42", "06"), ("43", "09"), ("44", "09"),
    ("45", "09"), ("46", "02"), ("47", "09"), ("48", "09"), ("49", "01"),
    ("50", "09"), ("51", "01"), ("52", "09"), ("99", "99"), ("MD", "99"),
    ("3001", "0501"), ("3002", "0501"), ("3003", "0501"), ("3004", "0501"), ("3005", "0507"),
    ("3006", "0199"), ("3007", "0505"), ("3008", "0503"), ("3009", "0611"), ("3099", "0599"),
    ("3101", "0109"), ("3102", "0109"), ("3103", "0109"), ("3104", "0109"), ("3105", "0109"),
    ("3106", "0199"), ("3107", "0109"), ("3108", "0109"), ("3109", "0109"), ("3199", "0109"),
    ("3201", "0601"), ("3202", "0601"), ("3203", "0607"), ("3204", "0601"), ("3205", "0199"),
    ("3206", "0199"), ("3207", "0199"), ("3208", "0109"), ("3209", "0601"), ("3210", "0699"),
    ("3211", "0601"), ("3212", "0609"), ("3213", "0601"), ("3214", "0605"), ("3215", "0601"),
    ("3299", "0699"), ("3301", "0401"), ("3302", "0401"), ("3303", "0401"), ("3304", "0401"),
    ("3399", "0401"), ("3401", "0105"), ("3402", "0105"), ("3403", "0105"), ("3404", "0105"),
    ("3405", "0105"), ("3406", "0105"), ("3407", "0105"), ("3499", "0105"), ("3501", "0801"),
    ("3502", "0811"), ("3503", "0803"), ("3504", "0803"), ("3505", "0803"), ("3506", "0805"),
    ("3507", "0803"), ("3508", "0807"), ("3509", "0899"), ("3599", "0899"), ("3601", "1099"),
    ("3602", "1001"), ("3603", "1001"), ("3604", "1001"), ("3605", "1007"), ("3606", "1003"),
    ("3699", "1099"), ("3701", "0107"), ("3702", "0107"), ("3703", "0107"), ("3704", "0107"),
    ("3705", "0107"), ("3706", "0107"), ("3707", "0107"), ("3708", "0107"), ("3709", "0107"),
    ("3799", "0107"), ("3801", "0919"), ("3802", "0919"), ("3803", "0919"), ("3899", "0919"),
    ("3901", "0703"), ("3902", "0799"), ("3903", "0701"), ("3904", "0799"), ("3999", "0799"),
    ("4001", "0315"), ("4002", "0305"), ("4003", "0399"), ("4004", "0303"), ("4005", "0309"),
    ("4006", "0313"), ("4007", "0313"), ("4008", "0313"), ("4009", "0313"), ("4010", "0399"),
    ("4011", "0399"), ("4012", "0399"), ("4013", "0311"), ("4014", "0301"), ("4015", "0317"),
    ("4016", "0303"), ("4017", "0307"), ("4018", "0399"), ("4019", "0303"), ("4099", "0399"),
    ("4101", "0599"), ("4102", "0109"), ("4103", "0509"), ("4104", "0509"), ("4105", "0599"),
    ("4106", "0107"), ("4199", "0599"), ("4201", "0601"), ("4202", "0613"), ("4203", "0613"),
    ("4204", "0603"), ("4205", "0603"), ("4206", "0613"), ("4207", "0601"), ("4208", "0619"),
    ("4299", "0699"), ("4301", "0903"), ("4302", "0903"), ("4303", "0903"), ("4399", "0903"),
    ("4401", "0903"), ("4402", "0999"), ("4403", "0999"), ("4404", "0903"), ("4405", "0903"),
    ("4406", "0903"), ("4407", "0901"), ("4408", "0901"), ("4409", "0905"), ("4410", "0903"),
    ("4499", "0903"), ("4501", "0903"), ("4502", "0799"), ("4503", "0509"), ("4504", "0613"),
    ("4505", "0903"), ("4506", "0699"), ("4507", "0903"), ("4508", "0799"), ("4509", "0509"),
    ("4510", "0613"), ("4511", "0903"), ("4512", "0699"), ("4513", "0903"), ("4514", "0799"),
    ("4515", "0509"), ("4516", "0613"), ("4517", "0699"), ("4518", "0903"), ("4519", "0203"),
    ("4599", "0999"), ("4601", "0299"), ("4602", "0201"), ("4603", "0201"), ("4604", "0201"),
    ("4605", "0203"), ("4606", "0201"), ("4607", "0201"), ("4608", "0203"), ("4609", "0203"),
    ("4610", "0913"), ("4611", "0201"), ("4612", "0201"), ("4613", "0201"), ("4699", "0299"),
    ("4701", "1007"), ("4702", "0903"), ("4703", "0915"), ("4704", "0915"), ("4705", "0915"),
    ("4799", "0903"), ("4801", "0909"), ("4802", "0909"), ("4803", "0909"), ("4804", "0909"),
    ("4805", "0909"), ("4806", "0909"), ("4807", "0909"), ("4899", "0909"), ("4901", "0101"),
    ("4902", "0101"), ("4903", "0101"), ("4904", "0101"), ("4905", "0101"), ("4999", "0101"),
    ("5001", "0917"), ("5002", "0917"), ("5003", "0917"), ("5004", "0917"), ("5005", "0917"),
    ("5099", "0917"), ("5101", "0103"), ("5102", "0103"), ("5103", "0103"), ("5104", "0103"),
    ("5105", "0103"), ("5106", "0103"), ("5107", "0103"), ("5108", "0103"), ("5109", "0103"),
    ("5110", "0103"), ("5199", "0103"), ("5201", "0907"), ("5202", "0907"), ("5203", "0907"),
    ("5204", "0907"), ("5205", "0907"), ("5299", "0907"),
];

static FOE_NAMES: &[(&str, &str)] = &[
    ("01", "Natural and Physical Sciences"),
    ("0101", "Mathematical Sciences"),
    ("0103", "Physics and Astronomy"),
    ("0105", "Chemical Sciences"),
    ("0107", "Earth Sciences"),
    ("0109", "Biological Sciences"),
    ("0199", "Other Natural and Physical Sciences"),
    ("02", "Information Technology"),
    ("0201", "Computer Science"),
    ("0203", "Information Systems"),
    ("0299", "Other Information Technology"),
    ("03", "Engineering and Related Technologies"),
    ("0301", "Manufacturing Engineering and Technology"),
    ("0303", "Process and Resources Engineering"),
    ("0305", "Automotive Engineering and Technology"),
    ("0307", "Mechanical and Industrial Engineering and Technology"),
    ("0309", "Civil Engineering"),
    ("0311", "Geomatic Engineering"),
    ("0313", "Electrical and Electronic Engineering and Technology"),
    ("0315", "Aerospace Engineering and Technology"),
    ("0317", "Maritime Engineering and Technology"),
    ("0399", "Other Engineering and Related Technologies"),
    ("04", "Architecture and Building"),
    ("0401", "Architecture and Urban Environment"),
    ("0403", "Building"),
    ("05", "Agriculture, Environmental and Related Studies"),
    ("0501", "Agriculture"),
    ("0503", "Horticulture and Viticulture"),
    ("0505", "Forestry Studies"),
    ("0507", "Fisheries Studies"),
    ("0509", "Environmental Studies"),
    ("0599", "Other Agriculture, Environmental and Related Studies"),
    ("06", "Health"),
    ("0601", "Medical Studies"),
    ("0603", "Nursing"),
    ("0605", "Pharmacy"),
    ("0607", "Dental Studies"),
    ("0609", "Optical Science"),
    ("0611", "Veterinary Studies"),
    ("0613", "Public Health"),
    ("0615", "Radiography"),
    ("0617", "Rehabilitation Therapies"),
    ("0619", "Complementary Therapies"),
    ("0699", "Other Health"),
    ("07", "Education"),
    ("0701", "Teacher Education"),
    ("0703", "Curriculum and Education Studies"),
    ("0799", "Other Education"),
    ("08", "Management and Commerce"),
    ("0801", "Accounting"),
    ("0803", "Business and Management"),
    ("0805", "Sales and Marketing"),
    ("0807", "Tourism"),
    ("0809", "Office Studies"),
    ("0811", "Banking, Finance and Related Fields"),
    ("0899", "Other Management and Commerce"),
    ("09", "Society and Culture"),
    ("0901", "Political Science and Policy Studies"),
    ("0903", "Studies in Human Society"),
    ("0905", "Human Welfare Studies and Services"),
    ("0907", "Behavioural Science"),
    ("0909", "Law"),
    ("0911", "Justice and Law Enforcement"),
    ("0913", "Librarianship, Information Management and Curatorial Studies"),
    ("0915", "Language and Literature"),
    ("0917", "Philosophy and Religious Studies"),
    ("0919", "Economics and Econometrics"),
    ("0921", "Sport and Recreation"),
    ("0999", "Other Society and Culture"),
    ("10", "Creative Arts"),
    ("1001", "Performing Arts"),
    ("1003", "Visual Arts and Crafts"),
    ("1005", "Graphic and Design Studies"),
    ("1007", "Communication and Media Studies"),
    ("1099", "Other Creative Arts"),
    ("11", "Food, Hospitality and Personal Services"),
    ("1101", "Food and Hospitality"),
    ("1103", "Personal Services"),
    ("12", "Mixed Field Programmes"),
    ("1201", "General Education Programmes"),
    ("1203", "Social Skills Programmes"),
    ("1205", "Employment Skills Programmes"),
    ("1299", "Other Mixed Field Programmes"),
    ("99", "Multidisciplinary"),
];

static FOR_TO_FOE_MAP: LazyLock<FxHashMap<&'static str, &'static str>> =
    LazyLock::new(|| FOR_TO_FOE.iter().copied().collect());

static FOE_NAME_MAP: LazyLock<FxHashMap<&'static str, &'static str>> =
    LazyLock::new(|| FOE_NAMES.iter().copied().collect());

/// FoE code for a FoR code, if mapped.
pub fn foe_code(for_code: &str) -> Option<&'static str> {
    FOR_TO_FOE_MAP.get(for_code).copied()
}

/// Display name of a FoE code.
pub fn foe_name(code: &str) -> Option<&'static str> {
    FOE_NAME_MAP.get(code).copied()
}

/// Every FoE (code, name) pair, 2-digit divisions before their groups.
pub fn foe_names() -> &'static [(&'static str, &'static str)] {
    FOE_NAMES
}

/// Normalize one digit group, then merge repeated codes in first-seen order.
fn finalise(group: Vec<Apportionment>) -> Option<Vec<Apportionment>> {
    let weights: Vec<f64> = group.iter().map(|a| a.weight).collect();
    let scaled = normalize(&weights).ok()?;
    let mut out: Vec<Apportionment> = Vec::with_capacity(group.len());
    for (app, w) in group.into_iter().zip(scaled) {
        match out.iter_mut().find(|o| o.code == app.code) {
            Some(o) => o.weight += f64::from(w),
            None => out.push(Apportionment::new(app.code, f64::from(w))),
        }
    }
    Some(out)
}

/// Translate a FoR apportionment into FoE codes.
///
/// Returns `None` when any code is unmapped (or a weight is invalid); the
/// caller drops the paper's apportionment in that case.
pub fn translate(apportionments: &[Apportionment]) -> Option<Vec<Apportionment>> {
    let mut mapped2 = Vec::new();
    let mut mapped4 = Vec::new();
    for app in apportionments {
        let code = foe_code(&app.code)?;
        match Digits::of(code)? {
            Digits::Two => mapped2.push(Apportionment::new(code, app.weight)),
            Digits::Four => mapped4.push(Apportionment::new(code, app.weight)),
        }
    }

    if !mapped4.is_empty() {
        mapped2 = mapped4
            .iter()
            .map(|a| Apportionment::new(&a.code[..Digits::Two.width()], a.weight))
            .collect();
    }

    let mut out = finalise(mapped2)?;
    out.extend(finalise(mapped4)?);
    Some(out)
}

/// Translate every paper in place; returns how many lost their apportionment.
pub fn translate_papers(papers: &mut [Paper]) -> usize {
    let mut dropped = 0;
    for paper in papers.iter_mut() {
        match translate(&paper.fields) {
            Some(fields) => paper.fields = fields,
            None => {
                paper.fields.clear();
                dropped += 1;
            }
        }
    }
    if dropped > 0 {
        log::warn!("translate: {dropped} papers had unmapped codes and lost their apportionment");
    }
    dropped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apps(list: &[(&str, f64)]) -> Vec<Apportionment> {
        list.iter().map(|(c, w)| Apportionment::new(*c, *w)).collect()
    }

    fn pairs(out: &[Apportionment]) -> Vec<(&str, f64)> {
        out.iter().map(|a| (a.code.as_str(), a.weight)).collect()
    }

    #[test]
    fn four_digit_codes_rebuild_two_digit_group() {
        // 3201 -> 0601, 4203 -> 0613, divisions 32/42 -> 06
        let out = translate(&apps(&[("32", 60.0), ("42", 40.0), ("3201", 60.0), ("4203", 40.0)]))
            .unwrap();
        assert_eq!(pairs(&out), vec![("06", 100.0), ("0601", 60.0), ("0613", 40.0)]);
    }

    #[test]
    fn merged_codes_sum_to_100() {
        // 3001..3004 all map to 0501
        let out = translate(&apps(&[("3001", 25.0), ("3002", 25.0), ("3003", 25.0), ("3004", 25.0)]))
            .unwrap();
        assert_eq!(pairs(&out), vec![("05", 100.0), ("0501", 100.0)]);
    }

    #[test]
    fn each_group_sums_to_100() {
        let out = translate(&apps(&[
            ("3101", 1.0),
            ("3901", 1.0),
            ("4601", 1.0),
            ("31", 1.0),
            ("39", 1.0),
            ("46", 1.0),
        ]))
        .unwrap();
        for d in [Digits::Two, Digits::Four] {
            let total: f64 = out
                .iter()
                .filter(|a| a.digits() == Some(d))
                .map(|a| a.weight)
                .sum();
            assert_eq!(total, 100.0, "{d}-digit group");
        }
    }

    #[test]
    fn two_digit_only_input_stays_two_digit() {
        let out = translate(&apps(&[("MD", 50.0), ("99", 50.0)])).unwrap();
        assert_eq!(pairs(&out), vec![("99", 100.0)]);
    }

    #[test]
    fn unmapped_code_drops_everything() {
        assert!(translate(&apps(&[("3201", 50.0), ("0601", 50.0)])).is_none());
    }

    #[test]
    fn foe_coded_input_is_rejected() {
        // already-translated codes are not FoR codes
        let out = translate(&apps(&[("06", 100.0), ("0601", 100.0)]));
        assert!(out.is_none());
    }

    #[test]
    fn empty_apportionment_translates_to_empty() {
        assert_eq!(translate(&[]), Some(Vec::new()));
    }

    #[test]
    fn names_cover_every_mapped_code() {
        for (_, foe) in FOR_TO_FOE {
            assert!(foe_name(foe).is_some(), "no name for {foe}");
        }
        assert_eq!(foe_name("0601"), Some("Medical Studies"));
    }

    #[test]
    fn translate_papers_counts_drops() {
        let paper = |fields: &[(&str, f64)]| Paper {
            doi: "10.1/x".into(),
            year: 2020,
            citations: 1,
            is_oa: false,
            journal: None,
            institutions: vec![],
            fields: apps(fields),
        };
        let mut papers = vec![paper(&[("3201", 100.0)]), paper(&[("0601", 100.0)])];
        assert_eq!(translate_papers(&mut papers), 1);
        assert_eq!(papers[0].fields.len(), 2);
        assert!(papers[1].fields.is_empty());
    }
}
