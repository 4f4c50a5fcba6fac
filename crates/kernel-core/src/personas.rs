//! Static stakeholder and evidence reference data. Not engine state.

use contracts::{EvidenceId, PersonaId};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct Persona {
    pub id: PersonaId,
    pub name: &'static str,
    pub role: &'static str,
    pub description: &'static str,
    pub public_stance: &'static str,
    #[serde(skip)]
    pub hidden_preference: &'static str,
    pub evidence_ids: &'static [EvidenceId],
}

impl Persona {
    pub fn is_chattable(&self) -> bool {
        self.id != PersonaId::Narrator
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EvidenceDoc {
    pub id: EvidenceId,
    pub title: &'static str,
    pub owner: PersonaId,
    pub summary: &'static str,
    pub content: &'static str,
    pub tags: &'static [&'static str],
}

pub const PLAYER_NAME: &str = "Planner";

static PERSONAS: [Persona; 5] = [
    Persona {
        id: PersonaId::AuntZhang,
        name: "Aunt Zhang",
        role: "Community representative / long-time resident",
        description: "Conservative and emotional; cares about noise, grocery prices and the evening square dance.",
        public_stance: "Quality of daily life first: quiet nights, affordable groceries, a neighbourhood where people know each other.",
        hidden_preference: "Really wants a stable activity room and brighter street lights for evening activities.",
        evidence_ids: &[EvidenceId::ResidentPetition, EvidenceId::NoiseComplaints],
    },
    Persona {
        id: PersonaId::CeoLi,
        name: "CEO Li",
        role: "Property developer / investor",
        description: "Rational, data-driven and blunt; talks in ROI and payback periods.",
        public_stance: "Invests only when returns and the exit path are clear.",
        hidden_preference: "Values policy certainty and approval speed more than a few extra points of margin.",
        evidence_ids: &[EvidenceId::DeveloperRoiSheet, EvidenceId::InvestorTermSheet],
    },
    Persona {
        id: PersonaId::DrChen,
        name: "Dr. Chen",
        role: "Environmental and urban systems expert",
        description: "Rigorous and academic; focused on long-term risks such as carbon emissions and heat islands.",
        public_stance: "Sustainability and public space first, with low-carbon infrastructure to cut long-term risk.",
        hidden_preference: "Wants measurable indicators and a monitoring plan, not slogans.",
        evidence_ids: &[EvidenceId::CarbonAssessment, EvidenceId::HeatIslandReport],
    },
    Persona {
        id: PersonaId::GovOfficer,
        name: "Section Chief Wang",
        role: "Government approval officer",
        description: "Procedure-driven and risk-averse; insists on compliance, public interest and traceable budgets.",
        public_stance: "No approval without zoning compliance, safety and an auditable budget.",
        hidden_preference: "Prefers plans with few complaints, low risk and a clean audit trail.",
        evidence_ids: &[EvidenceId::ZoningGuidelines, EvidenceId::BudgetAuditNote],
    },
    Persona {
        id: PersonaId::Narrator,
        name: "Narrator",
        role: "System narrator",
        description: "Moves the timeline forward and announces events.",
        public_stance: "Keeps the process moving and reports outcomes.",
        hidden_preference: "None.",
        evidence_ids: &[],
    },
];

static EVIDENCE: [EvidenceDoc; 8] = [
    EvidenceDoc {
        id: EvidenceId::ResidentPetition,
        title: "Joint resident petition (Old Banyan Street block)",
        owner: PersonaId::AuntZhang,
        summary: "Keep the neighbourhood together, add activity space, improve lighting and safety.",
        content: "Petition points:\n1) Control night-time construction noise and dust;\n2) Keep some old housing and guarantee the right to return for original residents;\n3) Build a community activity centre / square-dance plaza;\n4) Add street lights, barrier-free facilities and public toilets;\n5) Do not replace everyday shops (wet market, corner stores) entirely with high-end retail.\n",
        tags: &["satisfaction", "social", "accessibility"],
    },
    EvidenceDoc {
        id: EvidenceId::NoiseComplaints,
        title: "Noise and disturbance complaints (last 12 months)",
        owner: PersonaId::AuntZhang,
        summary: "Complaints cluster around night construction, truck horns and restaurant fumes.",
        content: "Summary:\n- Night-time noise: 52% of complaints;\n- Dust and road occupation: 27%;\n- Cooking fumes and litter: 21%;\nSuggestions: restricted construction hours, noise barriers, logistics rerouting, fume scrubbers.\n",
        tags: &["satisfaction", "environment", "risk"],
    },
    EvidenceDoc {
        id: EvidenceId::DeveloperRoiSheet,
        title: "Developer return estimate (ROI/IRR summary)",
        owner: PersonaId::CeoLi,
        summary: "More commercial and office space lifts the economy, but returns are sensitive to approval speed.",
        content: "Key assumptions:\n- More leasable area means stronger economic activity;\n- Approval delays beyond 2 turns cut returns noticeably;\n- Supporting public space lowers reputational risk and indirectly lifts occupancy.\n",
        tags: &["economy", "budget", "risk"],
    },
    EvidenceDoc {
        id: EvidenceId::InvestorTermSheet,
        title: "Investment term sheet (summary)",
        owner: PersonaId::CeoLi,
        summary: "Conditions: stable policy, a public communication channel, staged disbursement.",
        content: "Key terms:\n1) Clear policy and floor-area-ratio limits;\n2) A community communication and complaint-response mechanism;\n3) Staged funding: first tranche released after approval;\n4) Funding may be suspended after major environmental violations or mass incidents.\n",
        tags: &["economy", "governance", "risk"],
    },
    EvidenceDoc {
        id: EvidenceId::CarbonAssessment,
        title: "Carbon and energy assessment (baseline and renewal scenario)",
        owner: PersonaId::DrChen,
        summary: "Green space and better public transport contribute most to long-term environmental metrics.",
        content: "Conclusions:\n- More green space and permeable paving reduce the heat-island effect;\n- Converting old factories into startup parks needs matching efficiency upgrades;\n- High-intensity development raises traffic and energy pressure.\n",
        tags: &["environment", "metrics", "long_term"],
    },
    EvidenceDoc {
        id: EvidenceId::HeatIslandReport,
        title: "Heat-island monitoring brief (summer heat week)",
        owner: PersonaId::DrChen,
        summary: "Areas with more hard surface feel hotter; elderly residents are most at risk.",
        content: "Highlights:\n- Peak activity of elderly residents overlaps with peak heat;\n- Shade trees, wind corridors and pocket green spaces noticeably improve comfort;\n- Keep ventilation corridors open and avoid airless street canyons.\n",
        tags: &["environment", "health", "satisfaction"],
    },
    EvidenceDoc {
        id: EvidenceId::ZoningGuidelines,
        title: "Land-use and approval guidelines (excerpt)",
        owner: PersonaId::GovOfficer,
        summary: "Compliance boundaries: land-use type, public-space ratio, fire safety and accessibility.",
        content: "Compliance checklist (excerpt):\n1) Public-space ratio not below threshold;\n2) Fire lanes, evacuation and building spacing;\n3) Continuous accessibility and elderly-friendly facilities;\n4) Traceable funding sources and budget.\n",
        tags: &["governance", "compliance", "risk"],
    },
    EvidenceDoc {
        id: EvidenceId::BudgetAuditNote,
        title: "Budget audit memo",
        owner: PersonaId::GovOfficer,
        summary: "Budgets must be reviewable: itemized costs, procurement method, milestones.",
        content: "Audit focus:\n- Itemized unit costs;\n- A documented procurement and tendering trail;\n- Staged acceptance tied to disbursement;\n- Public-relations and safety contingency costs must be included.\n",
        tags: &["budget", "governance", "risk"],
    },
];

pub fn all_personas() -> &'static [Persona] {
    &PERSONAS
}

pub fn all_evidence() -> &'static [EvidenceDoc] {
    &EVIDENCE
}

pub fn persona(id: PersonaId) -> &'static Persona {
    match id {
        PersonaId::AuntZhang => &PERSONAS[0],
        PersonaId::CeoLi => &PERSONAS[1],
        PersonaId::DrChen => &PERSONAS[2],
        PersonaId::GovOfficer => &PERSONAS[3],
        PersonaId::Narrator => &PERSONAS[4],
    }
}

pub fn evidence(id: EvidenceId) -> &'static EvidenceDoc {
    match id {
        EvidenceId::ResidentPetition => &EVIDENCE[0],
        EvidenceId::NoiseComplaints => &EVIDENCE[1],
        EvidenceId::DeveloperRoiSheet => &EVIDENCE[2],
        EvidenceId::InvestorTermSheet => &EVIDENCE[3],
        EvidenceId::CarbonAssessment => &EVIDENCE[4],
        EvidenceId::HeatIslandReport => &EVIDENCE[5],
        EvidenceId::ZoningGuidelines => &EVIDENCE[6],
        EvidenceId::BudgetAuditNote => &EVIDENCE[7],
    }
}

fn mentions_any(lowered: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| lowered.contains(needle))
}

/// Which of the persona's documents to put on the table for this message.
pub fn pick_evidence(persona: PersonaId, user_text: &str) -> Vec<EvidenceId> {
    let lowered = user_text.to_lowercase();
    let picked = match persona {
        PersonaId::AuntZhang => {
            if mentions_any(&lowered, &["noise", "噪", "扰民"]) {
                EvidenceId::NoiseComplaints
            } else {
                EvidenceId::ResidentPetition
            }
        }
        PersonaId::CeoLi => {
            if mentions_any(&lowered, &["roi", "return", "invest", "回报", "投资", "收益"]) {
                EvidenceId::DeveloperRoiSheet
            } else {
                EvidenceId::InvestorTermSheet
            }
        }
        PersonaId::DrChen => {
            if mentions_any(&lowered, &["heat", "health", "热岛", "高温", "健康"]) {
                EvidenceId::HeatIslandReport
            } else {
                EvidenceId::CarbonAssessment
            }
        }
        PersonaId::GovOfficer => {
            if mentions_any(&lowered, &["budget", "audit", "tender", "预算", "审计", "招标"]) {
                EvidenceId::BudgetAuditNote
            } else {
                EvidenceId::ZoningGuidelines
            }
        }
        PersonaId::Narrator => return Vec::new(),
    };
    vec![picked]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_tables_are_consistent() {
        for id in PersonaId::ALL {
            assert_eq!(persona(id).id, id);
            for evidence_id in persona(id).evidence_ids {
                assert_eq!(evidence(*evidence_id).owner, id);
            }
        }
        for doc in all_evidence() {
            assert_eq!(evidence(doc.id).title, doc.title);
        }
    }

    #[test]
    fn narrator_is_not_chattable() {
        assert!(!persona(PersonaId::Narrator).is_chattable());
        assert!(pick_evidence(PersonaId::Narrator, "anything").is_empty());
    }

    #[test]
    fn picker_follows_keywords() {
        assert_eq!(
            pick_evidence(PersonaId::AuntZhang, "What about the NOISE at night?"),
            vec![EvidenceId::NoiseComplaints]
        );
        assert_eq!(
            pick_evidence(PersonaId::AuntZhang, "hello"),
            vec![EvidenceId::ResidentPetition]
        );
        assert_eq!(
            pick_evidence(PersonaId::GovOfficer, "预算够吗"),
            vec![EvidenceId::BudgetAuditNote]
        );
        assert_eq!(
            pick_evidence(PersonaId::DrChen, "carbon?"),
            vec![EvidenceId::CarbonAssessment]
        );
    }

    #[test]
    fn hidden_preference_is_not_serialized() {
        let encoded = serde_json::to_value(persona(PersonaId::CeoLi)).expect("serialize persona");
        assert!(encoded.get("hidden_preference").is_none());
        assert_eq!(encoded["id"], "ceo_li");
    }
}
