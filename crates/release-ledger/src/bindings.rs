//! ABI surface of the release manager contract.
//!
//! Only the functions avsctl calls are declared. Struct field order follows
//! the on-chain types, which matters for encoding.

alloy::sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct OperatorSet {
        address avs;
        uint32 id;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Artifact {
        bytes32 digest;
        string registry;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct Release {
        Artifact[] artifacts;
        uint32 upgradeByTime;
    }

    interface IReleaseManager {
        function publishRelease(OperatorSet calldata operatorSet, Release calldata release) external returns (uint256 releaseId);
        function publishMetadataURI(OperatorSet calldata operatorSet, string calldata metadataURI) external;
        function getTotalReleases(OperatorSet memory operatorSet) external view returns (uint256 total);
        function getRelease(OperatorSet memory operatorSet, uint256 releaseId) external view returns (Release memory release);
        function getLatestRelease(OperatorSet memory operatorSet) external view returns (uint256 releaseId, Release memory release);
        function getLatestUpgradeByTime(OperatorSet memory operatorSet) external view returns (uint32 upgradeByTime);
        function getMetadataURI(OperatorSet memory operatorSet) external view returns (string memory metadataURI);
    }
}
