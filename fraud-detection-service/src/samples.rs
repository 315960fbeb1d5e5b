use serde::Serialize;

/// A ready-made claim for demonstrating the analyzer.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SampleClaim {
    pub name: &'static str,
    pub claim_text: &'static str,
}

pub const SAMPLE_CLAIMS: [SampleClaim; 4] = [
    SampleClaim {
        name: "Legitimate Office Visit",
        claim_text: "Medical claim #CLM-2024-001
Member ID: MEM-456789
Provider: Dr. Sarah Chen, Internal Medicine
Date of Service: 2024-12-10
Billed Amount: $185
Description: Annual wellness visit for established patient. Preventive care exam with routine blood work. Member has consistent visit history with this in-network provider. Diagnosis codes and procedure codes align correctly. Standard reimbursement request.",
    },
    SampleClaim {
        name: "Upcoding Scheme",
        claim_text: "Medical claim #CLM-2024-045
Member ID: MEM-123456
Provider: QuickCare Medical Center (Out-of-Network)
Date of Service: 2024-12-12
Billed Amount: $47,500
Description: Provider billing for complex surgical procedures but documentation shows only routine office visit. Four similar high-complexity claims for same patient in 6 months. Diagnosis codes (routine checkup) don't match procedure codes (major surgery). Provider has pattern of upcoding across multiple patients. Medical necessity not established.",
    },
    SampleClaim {
        name: "Phantom Billing",
        claim_text: "Medical claim #CLM-2024-089
Member ID: MEM-789012
Provider: Metro Health Services
Date of Service: 2024-12-08
Billed Amount: $12,000
Description: Provider billing for services member never received. Member confirmed they were out of state on date of service. Provider submitting claims for same patient on multiple dates when patient was traveling. Pattern of billing for non-existent appointments. Provider address flagged as residential location.",
    },
    SampleClaim {
        name: "Prescription Drug Diversion",
        claim_text: "Pharmacy claim #CLM-2024-112
Member ID: MEM-345678
Provider: Valley Pharmacy (Out-of-Network)
Date of Service: 2024-12-05
Billed Amount: $8,500
Description: Multiple high-cost controlled substance prescriptions filled at out-of-network pharmacy far from member's home. Same medications refilled early repeatedly. Prescriber has no prior relationship with patient. Pharmacy has pattern of early refills and doctor shopping indicators. Member has 8 different prescribers in 3 months.",
    },
];

pub fn find_sample(name: &str) -> Option<&'static SampleClaim> {
    let name = name.trim();
    SAMPLE_CLAIMS
        .iter()
        .find(|sample| sample.name.eq_ignore_ascii_case(name))
}

pub const GENIE_EXAMPLE_QUESTIONS: [&str; 10] = [
    "Show me all fraudulent claims",
    "What are the top 10 highest risk claims?",
    "Show claims with amount greater than $40,000",
    "Which providers have the most fraud cases?",
    "Show fraud trends by month",
    "What is the average claim amount for fraudulent vs legitimate claims?",
    "Which claim types have the highest fraud rate?",
    "Show me claims with risk score above 8",
    "What are the most common fraud red flags?",
    "Compare fraud rates across different claim types",
];
